//! Per-child feature gating.

use famquest_shared::api::AccessDto;
use famquest_shared::auth::Role;
use famquest_shared::domain::Feature;

use crate::storage::{Store, StorageError, models::AccessSettings};

/// Resolve whether a caller may use a feature.
///
/// Parents are never gated. For a child with no settings row every feature
/// resolves to `true`: a new child must not be locked out before a parent
/// has configured anything, so absent configuration fails open. This is a
/// product decision, not an oversight.
pub fn has_access(role: Role, settings: Option<&AccessSettings>, feature: Feature) -> bool {
    if role == Role::Parent {
        return true;
    }
    match settings {
        None => true,
        Some(s) => match feature {
            Feature::Tutors => s.tutors_enabled,
            Feature::HabitTracker => s.habit_tracker_enabled,
            Feature::Journal => s.journal_enabled,
            Feature::Tasks => s.tasks_enabled,
        },
    }
}

pub fn to_dto(settings: Option<&AccessSettings>) -> AccessDto {
    AccessDto {
        tutors: settings.map(|s| s.tutors_enabled).unwrap_or(true),
        habit_tracker: settings.map(|s| s.habit_tracker_enabled).unwrap_or(true),
        journal: settings.map(|s| s.journal_enabled).unwrap_or(true),
        tasks: settings.map(|s| s.tasks_enabled).unwrap_or(true),
    }
}

pub async fn resolve_child_access(store: &Store, child_id: &str) -> Result<AccessDto, StorageError> {
    let settings = store.get_access_settings(child_id).await?;
    Ok(to_dto(settings.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn settings(tutors: bool, habits: bool, journal: bool, tasks: bool) -> AccessSettings {
        let now = Utc::now().naive_utc();
        AccessSettings {
            child_id: "child-1".to_string(),
            tutors_enabled: tutors,
            habit_tracker_enabled: habits,
            journal_enabled: journal,
            tasks_enabled: tasks,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn parents_are_never_gated() {
        let locked_down = settings(false, false, false, false);
        for feature in [
            Feature::Tutors,
            Feature::HabitTracker,
            Feature::Journal,
            Feature::Tasks,
        ] {
            assert!(has_access(Role::Parent, Some(&locked_down), feature));
            assert!(has_access(Role::Parent, None, feature));
        }
    }

    #[test]
    fn unconfigured_child_fails_open() {
        for feature in [
            Feature::Tutors,
            Feature::HabitTracker,
            Feature::Journal,
            Feature::Tasks,
        ] {
            assert!(has_access(Role::Child, None, feature));
        }
    }

    #[test]
    fn configured_child_gets_stored_booleans() {
        let s = settings(false, true, false, true);
        assert!(!has_access(Role::Child, Some(&s), Feature::Tutors));
        assert!(has_access(Role::Child, Some(&s), Feature::HabitTracker));
        assert!(!has_access(Role::Child, Some(&s), Feature::Journal));
        assert!(has_access(Role::Child, Some(&s), Feature::Tasks));
    }

    #[test]
    fn dto_defaults_to_allow_all() {
        let dto = to_dto(None);
        assert!(dto.tutors && dto.habit_tracker && dto.journal && dto.tasks);
    }
}
