use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::User;
use crate::db::types::{ClassRole, QuestionKind};
use crate::repositories;
use crate::services::invite_codes;

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let email = &admin.first_superuser_email;

    let user = repositories::users::find_by_email(state.db(), email).await?;
    let now = primitive_now_utc();

    if let Some(user) = user {
        let mut needs_update = false;
        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);

        let hashed_password = if verified {
            user.hashed_password.clone()
        } else {
            needs_update = true;
            security::hash_password(&admin.first_superuser_password)?
        };

        let is_platform_admin = if !user.is_platform_admin {
            needs_update = true;
            true
        } else {
            user.is_platform_admin
        };

        let is_active = if !user.is_active {
            needs_update = true;
            true
        } else {
            user.is_active
        };

        if needs_update {
            sqlx::query(
                "UPDATE users
                 SET hashed_password = $1,
                     is_platform_admin = $2,
                     is_active = $3,
                     updated_at = $4
                 WHERE id = $5",
            )
            .bind(hashed_password)
            .bind(is_platform_admin)
            .bind(is_active)
            .bind(now)
            .bind(user.id)
            .execute(state.db())
            .await?;

            tracing::info!("Updated default superuser {email}");
        } else {
            tracing::info!("Default superuser already up to date");
        }

        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;

    sqlx::query(
        "INSERT INTO users (
            id, email, hashed_password, full_name, is_platform_admin, is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(hashed_password)
    .bind("Platform Admin")
    .bind(true)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(state.db())
    .await?;

    tracing::info!("Created default superuser {email}");
    Ok(())
}

const DEMO_CLASS_SLUG: &str = "demo-class";
const DEMO_TEACHER_EMAIL: &str = "teacher@caderno.local";
const DEMO_PASSWORD: &str = "caderno-demo";

/// Dev fixture: one class with a teacher, two enrolled students and a
/// published task. Skipped entirely once the demo class exists.
pub(crate) async fn seed_demo_data(state: &AppState) -> anyhow::Result<()> {
    if repositories::classes::find_by_slug(state.db(), DEMO_CLASS_SLUG)
        .await?
        .is_some()
    {
        tracing::info!("Demo class already present; nothing to seed");
        return Ok(());
    }

    let now = primitive_now_utc();
    let teacher = ensure_demo_user(state, DEMO_TEACHER_EMAIL, "Dana Matos").await?;

    let class_id = Uuid::new_v4().to_string();
    let class = repositories::classes::create(
        state.db(),
        repositories::classes::CreateClass {
            id: &class_id,
            slug: DEMO_CLASS_SLUG,
            title: "Demo Class",
            is_active: true,
            created_by: &teacher.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    repositories::class_memberships::ensure_membership(
        state.db(),
        repositories::class_memberships::EnsureMembershipParams {
            class_id: &class.id,
            user_id: &teacher.id,
            role: ClassRole::Teacher,
            joined_at: now,
        },
    )
    .await?;

    for (email, full_name) in [
        ("alice@caderno.local", "Alice Ribeiro"),
        ("bruno@caderno.local", "Bruno Costa"),
    ] {
        let student = ensure_demo_user(state, email, full_name).await?;
        repositories::class_memberships::ensure_membership(
            state.db(),
            repositories::class_memberships::EnsureMembershipParams {
                class_id: &class.id,
                user_id: &student.id,
                role: ClassRole::Student,
                joined_at: now,
            },
        )
        .await?;
    }

    let code = invite_codes::generate_code(DEMO_CLASS_SLUG);
    let code_hash = invite_codes::hash_invite_code(&code);
    let invite_id = Uuid::new_v4().to_string();
    repositories::class_invites::create(
        state.db(),
        repositories::class_invites::CreateInviteCode {
            id: &invite_id,
            class_id: &class.id,
            code_hash: &code_hash,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    seed_demo_task(state, &class.id, &teacher.id).await?;

    tracing::info!("Seeded demo class '{DEMO_CLASS_SLUG}'");
    tracing::info!(
        "Demo accounts ({DEMO_TEACHER_EMAIL}, alice@caderno.local, bruno@caderno.local) \
         use password '{DEMO_PASSWORD}'"
    );
    tracing::info!("Demo invite code: {code}");
    Ok(())
}

async fn ensure_demo_user(
    state: &AppState,
    email: &str,
    full_name: &str,
) -> anyhow::Result<User> {
    if let Some(user) = repositories::users::find_by_email(state.db(), email).await? {
        return Ok(user);
    }

    let now = primitive_now_utc();
    let id = Uuid::new_v4().to_string();
    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &id,
            email,
            hashed_password: security::hash_password(DEMO_PASSWORD)?,
            full_name,
            is_platform_admin: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;
    Ok(user)
}

async fn seed_demo_task(
    state: &AppState,
    class_id: &str,
    teacher_id: &str,
) -> anyhow::Result<()> {
    let now = primitive_now_utc();
    let due_date = to_primitive_utc(OffsetDateTime::now_utc() + Duration::days(7));

    let mut tx = state.db().begin().await?;

    let task_id = Uuid::new_v4().to_string();
    repositories::tasks::create(
        &mut *tx,
        repositories::tasks::CreateTask {
            id: &task_id,
            class_id,
            title: "Fractions warm-up",
            description: Some("Two quick questions to try the submission flow."),
            points: 20.0,
            due_date,
            created_by: teacher_id,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    let mc_id = Uuid::new_v4().to_string();
    repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &mc_id,
            task_id: &task_id,
            position: 1,
            kind: QuestionKind::MultipleChoice,
            prompt: "What is 1/2 + 1/4?",
            points: 10.0,
            created_at: now,
        },
    )
    .await?;

    for (position, text, is_correct) in [
        (1, "3/4", true),
        (2, "2/6", false),
        (3, "1/6", false),
        (4, "2/4", false),
    ] {
        let option_id = Uuid::new_v4().to_string();
        repositories::questions::create_option(
            &mut *tx,
            repositories::questions::CreateQuestionOption {
                id: &option_id,
                question_id: &mc_id,
                position,
                text,
                is_correct,
            },
        )
        .await?;
    }

    let essay_id = Uuid::new_v4().to_string();
    repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &essay_id,
            task_id: &task_id,
            position: 2,
            kind: QuestionKind::Essay,
            prompt: "Explain how you would compare 2/3 and 3/5 without a calculator.",
            points: 10.0,
            created_at: now,
        },
    )
    .await?;

    tx.commit().await?;

    repositories::tasks::set_published(state.db(), &task_id, true, Some(now), now).await?;
    Ok(())
}
