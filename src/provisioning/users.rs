//! Synthetic test users.

use tracing::info;

use crate::user::UserRecord;

/// Departments assigned round-robin by user index.
pub const DEPARTMENTS: [&str; 6] = ["IT", "HR", "Finance", "Marketing", "Operations", "Sales"];

/// Roles assigned round-robin by user index.
pub const ROLES: [&str; 5] = ["Administrator", "Manager", "Analyst", "Specialist", "Coordinator"];

/// Generate `count` test users numbered from 1.
///
/// User `i` gets `DEPARTMENTS[i % 6]` and `ROLES[i % 5]`, so the output is a
/// pure function of `count`.
pub fn generate_test_users(count: usize) -> Vec<UserRecord> {
    let users: Vec<UserRecord> = (1..=count)
        .map(|i| {
            UserRecord::new()
                .with("email", format!("testuser{:03}@example.com", i))
                .with("firstname", format!("Test{:03}", i))
                .with("lastname", "User")
                .with("department", DEPARTMENTS[i % DEPARTMENTS.len()])
                .with("role", ROLES[i % ROLES.len()])
                .with("employee_id", format!("EMP{:04}", i))
                .with("status", "active")
        })
        .collect();

    info!(count, "Generated test users");
    users
}
