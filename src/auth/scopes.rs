use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::principal::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// A scope third-party applications can be granted, and which user roles
/// may hold it.
#[derive(Debug, Clone)]
pub struct ScopeDefinition {
    pub description: &'static str,
    pub roles: &'static [Role],
    pub access: Access,
}

const EVERYONE: &[Role] = &[
    Role::Student,
    Role::Teacher,
    Role::Admin,
    Role::Parent,
    Role::SuperAdmin,
];
const STUDENT: &[Role] = &[Role::Student];
const TEACHER: &[Role] = &[Role::Teacher];
const PARENT: &[Role] = &[Role::Parent];
const ADMINS: &[Role] = &[Role::Admin, Role::SuperAdmin];
const STAFF: &[Role] = &[Role::Teacher, Role::Admin, Role::SuperAdmin];

static CATALOG: Lazy<HashMap<&'static str, ScopeDefinition>> = Lazy::new(|| {
    use Access::{Read, Write};

    let entries: &[(&'static str, &'static str, &'static [Role], Access)] = &[
        ("profile.read", "Read user profile info", EVERYONE, Read),
        ("profile.email", "Read user email", EVERYONE, Read),
        ("profile.write", "Update user profile", EVERYONE, Write),
        ("student.classes.read", "Read student enrolled classes", STUDENT, Read),
        ("student.grades.read", "Read student grades", STUDENT, Read),
        ("student.assignments.read", "Read student assignments", STUDENT, Read),
        ("student.assignments.write", "Submit assignments", STUDENT, Write),
        ("student.attendance.read", "Read student attendance", STUDENT, Read),
        ("student.wellbeing.read", "Read student wellbeing data", STUDENT, Read),
        ("student.wellbeing.write", "Submit wellbeing surveys", STUDENT, Write),
        ("student.achievements.read", "Read student achievements", STUDENT, Read),
        ("teacher.students.read", "Read teacher's student list", TEACHER, Read),
        ("teacher.grades.read", "Read grades for teacher's students", TEACHER, Read),
        ("teacher.grades.write", "Update student grades", TEACHER, Write),
        ("teacher.attendance.read", "Read attendance records", TEACHER, Read),
        ("teacher.attendance.write", "Mark student attendance", TEACHER, Write),
        ("teacher.assignments.read", "Read assignments", TEACHER, Read),
        ("teacher.assignments.write", "Create/update assignments", TEACHER, Write),
        ("teacher.communications.read", "Read communications", TEACHER, Read),
        ("teacher.communications.write", "Send communications", TEACHER, Write),
        ("teacher.analytics.read", "View class analytics", TEACHER, Read),
        ("parent.children.read", "View children profiles", PARENT, Read),
        ("parent.grades.read", "View children grades", PARENT, Read),
        ("parent.attendance.read", "View children attendance", PARENT, Read),
        ("parent.communications.read", "Read school communications", PARENT, Read),
        ("parent.meetings.read", "View scheduled meetings", PARENT, Read),
        ("parent.meetings.write", "Schedule meetings", PARENT, Write),
        ("admin.users.read", "View all users", ADMINS, Read),
        ("admin.users.write", "Manage users", ADMINS, Write),
        ("admin.school.read", "View school settings", ADMINS, Read),
        ("admin.school.write", "Manage school settings", ADMINS, Write),
        ("admin.reports.read", "View admin reports", ADMINS, Read),
        ("admin.aegisx.read", "View AegisX data", ADMINS, Read),
        ("admin.aegisx.write", "Manage AegisX", ADMINS, Write),
        ("calendar.read", "Read calendar events", EVERYONE, Read),
        ("calendar.write", "Create calendar events", STAFF, Write),
        ("notifications.read", "Read notifications", EVERYONE, Read),
        ("notifications.write", "Send notifications", STAFF, Write),
        ("school.read", "View school info", EVERYONE, Read),
    ];

    entries
        .iter()
        .map(|&(name, description, roles, access)| {
            (
                name,
                ScopeDefinition {
                    description,
                    roles,
                    access,
                },
            )
        })
        .collect()
});

pub fn definition(scope: &str) -> Option<&'static ScopeDefinition> {
    CATALOG.get(scope)
}

/// First granted scope the role is not allowed to hold. Scopes outside the
/// catalog are application-defined and not checked here.
pub fn first_invalid_for_role<'a, I>(scopes: I, role: Role) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    scopes
        .into_iter()
        .find(|scope| {
            definition(scope)
                .map(|def| !def.roles.contains(&role))
                .unwrap_or(false)
        })
        .map(|s| s.as_str())
}
