use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::Class;
use crate::db::types::{ClassRole, MembershipStatus};
use crate::repositories::class_memberships::{MemberRow, MembershipView};

#[derive(Debug, Deserialize)]
pub(crate) struct ClassCreate {
    pub(crate) slug: String,
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinClassRequest {
    pub(crate) code: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassResponse {
    pub(crate) id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) is_active: bool,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
}

impl ClassResponse {
    pub(crate) fn from_db(class: Class) -> Self {
        Self {
            id: class.id,
            slug: class.slug,
            title: class.title,
            is_active: class.is_active,
            created_by: class.created_by,
            created_at: format_primitive(class.created_at),
        }
    }
}

/// One entry in a user's "my classes" listing.
#[derive(Debug, Serialize)]
pub(crate) struct ClassListItem {
    pub(crate) class_id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) role: ClassRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: String,
}

impl ClassListItem {
    pub(crate) fn from_view(view: MembershipView) -> Self {
        Self {
            class_id: view.class_id,
            slug: view.class_slug,
            title: view.class_title,
            role: view.role,
            status: view.status,
            joined_at: format_primitive(view.joined_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberResponse {
    pub(crate) user_id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: ClassRole,
    pub(crate) status: MembershipStatus,
    pub(crate) joined_at: String,
}

impl MemberResponse {
    pub(crate) fn from_row(row: MemberRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email,
            full_name: row.full_name,
            role: row.role,
            status: row.status,
            joined_at: format_primitive(row.joined_at),
        }
    }
}

/// The plain code only exists in this response; storage keeps the hash.
#[derive(Debug, Serialize)]
pub(crate) struct InviteCodeResponse {
    pub(crate) code: String,
}
