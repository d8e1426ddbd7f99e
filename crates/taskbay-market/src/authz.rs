//! Central capability predicate for task-scoped actions.
//!
//! Every command handler evaluates exactly one `can_act` call instead of
//! scattering role checks; the transition table in the lifecycle manager
//! then decides whether the action is legal in the current state.

use taskbay_types::{Actor, Task};

/// Actions an actor can attempt against an existing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Update,
    Delete,
    Cancel,
    Assign,
    Start,
    RequestCompletion,
    ConfirmCompletion,
    RejectCompletion,
    ViewBidContacts,
}

/// Whether `actor` holds the capability for `action` on `task`.
pub fn can_act(actor: &Actor, task: &Task, action: TaskAction) -> bool {
    if actor.is_admin() {
        // Admins may do everything except impersonate the assigned tasker
        // on a completion request, which is tasker-initiated by contract.
        return action != TaskAction::RequestCompletion;
    }

    match action {
        TaskAction::Update
        | TaskAction::Delete
        | TaskAction::Cancel
        | TaskAction::Assign
        | TaskAction::ConfirmCompletion
        | TaskAction::RejectCompletion
        | TaskAction::ViewBidContacts => task.is_owned_by(&actor.id),

        TaskAction::Start => task.is_assigned_to(&actor.id),
        TaskAction::RequestCompletion => task.is_assigned_to(&actor.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use taskbay_types::{Actor, Amount, FeeBreakdown, Role, Task, TaskId, TaskStatus, UserId};

    fn task_with(customer: UserId, assigned: Option<UserId>) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId::from_bytes([9u8; 32]),
            customer,
            assigned_to: assigned,
            title: "t".into(),
            description: "d".into(),
            category: "c".into(),
            subcategory: None,
            address: "a".into(),
            latitude: None,
            longitude: None,
            required_at: now,
            duration_hours: 1,
            is_urgent: false,
            images: vec![],
            budget: Amount::from_major(10),
            fees: FeeBreakdown::default(),
            status: TaskStatus::Assigned,
            completion_requested_at: None,
            completion_requested_by: None,
            completion_note: None,
            started_at: None,
            completed_at: None,
            customer_feedback: None,
            tasker_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_may_manage_but_not_start() {
        let customer = UserId::from_bytes([1u8; 32]);
        let tasker = UserId::from_bytes([2u8; 32]);
        let task = task_with(customer, Some(tasker));
        let owner = Actor::new(customer, Role::Customer, "o", "o@x");

        assert!(can_act(&owner, &task, TaskAction::Cancel));
        assert!(can_act(&owner, &task, TaskAction::ConfirmCompletion));
        assert!(!can_act(&owner, &task, TaskAction::Start));
        assert!(!can_act(&owner, &task, TaskAction::RequestCompletion));
    }

    #[test]
    fn assignee_may_execute_but_not_manage() {
        let customer = UserId::from_bytes([1u8; 32]);
        let tasker = UserId::from_bytes([2u8; 32]);
        let task = task_with(customer, Some(tasker));
        let assignee = Actor::new(tasker, Role::Tasker, "t", "t@x");

        assert!(can_act(&assignee, &task, TaskAction::Start));
        assert!(can_act(&assignee, &task, TaskAction::RequestCompletion));
        assert!(!can_act(&assignee, &task, TaskAction::Cancel));
        assert!(!can_act(&assignee, &task, TaskAction::ViewBidContacts));
    }

    #[test]
    fn admin_may_do_everything_except_request_completion() {
        let task = task_with(
            UserId::from_bytes([1u8; 32]),
            Some(UserId::from_bytes([2u8; 32])),
        );
        let admin = Actor::new(UserId::from_bytes([3u8; 32]), Role::Admin, "a", "a@x");

        assert!(can_act(&admin, &task, TaskAction::Cancel));
        assert!(can_act(&admin, &task, TaskAction::Start));
        assert!(!can_act(&admin, &task, TaskAction::RequestCompletion));
    }
}
