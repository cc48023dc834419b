//! Static role table and permission helpers
//!
//! Four roles exist in every clinic. Effective permissions are the union
//! of the user's role permissions and any permissions granted directly
//! (secretaries get those from the clinic owner).

use lazy_static::lazy_static;
use regex::Regex;
use reporting_engine::DoctorScope;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    SuperAdmin,
    ClinicSuperDoctor,
    Doctor,
    Secretary,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::ClinicSuperDoctor, Role::Doctor, Role::Secretary];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::ClinicSuperDoctor => "clinic_super_doctor",
            Role::Doctor => "doctor",
            Role::Secretary => "secretary",
        }
    }

    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Role::SuperAdmin => SUPER_ADMIN,
            Role::ClinicSuperDoctor => CLINIC_SUPER_DOCTOR,
            Role::Doctor => DOCTOR,
            Role::Secretary => SECRETARY,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

const SUPER_ADMIN: &[&str] = &[
    "view-all-patients", "create-patient", "edit-patient", "delete-patient", "search-patient",
    "view-all-cases", "create-case", "edit-case", "delete-case",
    "view-all-bills", "create-bill", "edit-bill", "delete-bill", "mark-bill-paid",
    "view-all-clinics", "create-clinic", "edit-clinic", "delete-clinic",
    "view-all-users", "create-user", "edit-user", "delete-user",
    "view-all-reservations", "create-reservation", "edit-reservation", "delete-reservation",
    "view-notes", "create-note", "edit-note", "delete-note",
    "view-all-recipes", "create-recipe", "edit-recipe", "delete-recipe",
    "view-recipe-items", "create-recipe-item", "edit-recipe-item", "delete-recipe-item",
    "view-clinic-expenses", "create-expense", "edit-expense", "delete-expense",
    "view-doctors", "create-doctor", "edit-doctor", "delete-doctor",
    "view-images", "create-image", "edit-image", "delete-image",
    "view-reports", "manage-permissions", "manage-roles",
    "view-clinic-settings", "edit-clinic-settings", "manage-setting-definitions",
];

const CLINIC_SUPER_DOCTOR: &[&str] = &[
    "view-clinic-patients", "create-patient", "edit-patient", "delete-patient", "search-patient",
    "view-clinic-cases", "create-case", "edit-case", "delete-case",
    "view-clinic-bills", "create-bill", "edit-bill", "delete-bill", "mark-bill-paid",
    "view-own-clinic", "edit-clinic",
    "view-clinic-users", "create-user", "edit-user", "delete-user",
    "view-clinic-reservations", "create-reservation", "edit-reservation", "delete-reservation",
    "view-notes", "create-note", "edit-note", "delete-note",
    "view-all-recipes", "create-recipe", "edit-recipe", "delete-recipe",
    "view-recipe-items", "create-recipe-item", "edit-recipe-item", "delete-recipe-item",
    "view-clinic-expenses", "create-expense", "edit-expense", "delete-expense",
    "view-doctors", "create-doctor", "edit-doctor", "delete-doctor",
    "view-images", "create-image", "edit-image", "delete-image",
    "view-reports",
    "view-clinic-settings", "edit-clinic-settings",
];

const DOCTOR: &[&str] = &[
    "view-clinic-patients", "create-patient", "edit-patient", "search-patient",
    "view-own-cases", "create-case", "edit-case",
    "view-own-bills", "create-bill", "edit-bill", "mark-bill-paid",
    "view-own-clinic", "view-clinic-users",
    "view-own-reservations", "create-reservation", "edit-reservation",
    "view-notes", "create-note", "edit-note",
    "view-own-recipes", "create-recipe", "edit-recipe", "delete-recipe",
    "view-recipe-items", "create-recipe-item", "edit-recipe-item", "delete-recipe-item",
    "view-clinic-expenses", "view-doctors",
    "view-images", "create-image", "edit-image", "delete-image",
    "view-reports",
];

const SECRETARY: &[&str] = &[
    "view-clinic-patients", "create-patient", "edit-patient", "search-patient",
    "view-clinic-cases",
    "view-clinic-bills", "create-bill", "mark-bill-paid",
    "view-own-clinic",
    "view-clinic-reservations", "create-reservation", "edit-reservation", "delete-reservation",
    "view-notes", "create-note",
    "view-clinic-expenses", "view-doctors", "view-images", "view-reports",
];

/// Roles parsed from their names; unknown names are ignored
pub fn parse_roles(names: &[String]) -> Vec<Role> {
    names.iter().filter_map(|n| n.parse().ok()).collect()
}

/// Union of role and direct permissions, sorted and without duplicates
pub fn effective_permissions(roles: &[String], direct: &[String]) -> Vec<String> {
    let mut set: BTreeSet<&str> = BTreeSet::new();
    for role in parse_roles(roles) {
        set.extend(role.permissions().iter().copied());
    }
    set.extend(direct.iter().map(String::as_str));
    set.into_iter().map(str::to_string).collect()
}

/// A user who is only a `doctor` sees their own rows; every other role
/// sees the whole clinic
pub fn doctor_scope(user_id: i64, roles: &[String]) -> DoctorScope {
    let parsed = parse_roles(roles);
    let unrestricted = parsed
        .iter()
        .any(|r| matches!(r, Role::SuperAdmin | Role::ClinicSuperDoctor | Role::Secretary));
    if !unrestricted && parsed.contains(&Role::Doctor) {
        DoctorScope::Doctor(user_id)
    } else {
        DoctorScope::All
    }
}

/// Permissions a clinic owner may grant a secretary directly
pub fn secretary_assignable() -> &'static [&'static str] {
    CLINIC_SUPER_DOCTOR
}

pub fn is_secretary_assignable(permission: &str) -> bool {
    CLINIC_SUPER_DOCTOR.contains(&permission)
}

lazy_static! {
    static ref RESOURCE_SUFFIX: Option<Regex> =
        Regex::new(r"-(patient|case|bill|reservation|note|recipe|expense|doctor|image|report|user|clinic)s?$").ok();
}

/// Group a permission belongs to in the permission picker
pub fn permission_group(permission: &str) -> String {
    let resource = RESOURCE_SUFFIX
        .as_ref()
        .and_then(|re| re.captures(permission))
        .and_then(|caps| caps.get(1));
    if let Some(resource) = resource {
        return format!("{}s", resource.as_str());
    }
    if permission.starts_with("manage-") {
        "system".to_string()
    } else {
        "general".to_string()
    }
}

/// `view-clinic-patients` -> `View Clinic Patients`
pub fn display_name(permission: &str) -> String {
    permission
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct PermissionInfo {
    pub name: String,
    pub display_name: String,
}

/// Permissions grouped by resource, for the secretary permission picker
pub fn grouped_permissions(permissions: &[&str]) -> BTreeMap<String, Vec<PermissionInfo>> {
    let mut groups: BTreeMap<String, Vec<PermissionInfo>> = BTreeMap::new();
    for permission in permissions {
        groups
            .entry(permission_group(permission))
            .or_default()
            .push(PermissionInfo {
                name: permission.to_string(),
                display_name: display_name(permission),
            });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(roles: &[Role]) -> Vec<String> {
        roles.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_role_round_trip_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn test_secretary_cannot_delete_patients() {
        let perms = effective_permissions(&names(&[Role::Secretary]), &[]);
        assert!(perms.contains(&"create-patient".to_string()));
        assert!(!perms.contains(&"delete-patient".to_string()));
    }

    #[test]
    fn test_direct_permissions_are_merged() {
        let perms = effective_permissions(
            &names(&[Role::Secretary]),
            &["delete-patient".to_string(), "create-patient".to_string()],
        );
        assert!(perms.contains(&"delete-patient".to_string()));
        assert_eq!(perms.iter().filter(|p| *p == "create-patient").count(), 1);
    }

    #[test]
    fn test_only_plain_doctors_are_scoped() {
        assert_eq!(doctor_scope(5, &names(&[Role::Doctor])), DoctorScope::Doctor(5));
        assert_eq!(doctor_scope(5, &names(&[Role::Doctor, Role::ClinicSuperDoctor])), DoctorScope::All);
        assert_eq!(doctor_scope(5, &names(&[Role::Secretary])), DoctorScope::All);
        assert_eq!(doctor_scope(5, &names(&[Role::SuperAdmin])), DoctorScope::All);
        assert_eq!(doctor_scope(5, &[]), DoctorScope::All);
    }

    #[test]
    fn test_settings_permissions() {
        assert!(Role::ClinicSuperDoctor.permissions().contains(&"edit-clinic-settings"));
        assert!(!Role::ClinicSuperDoctor.permissions().contains(&"manage-setting-definitions"));
        assert!(Role::SuperAdmin.permissions().contains(&"manage-setting-definitions"));
        assert!(!Role::Doctor.permissions().contains(&"view-clinic-settings"));
    }

    #[test]
    fn test_permission_groups() {
        assert_eq!(permission_group("view-clinic-patients"), "patients");
        assert_eq!(permission_group("create-case"), "cases");
        assert_eq!(permission_group("view-own-clinic"), "clinics");
        assert_eq!(permission_group("view-reports"), "reports");
        assert_eq!(permission_group("manage-roles"), "system");
        assert_eq!(permission_group("mark-bill-paid"), "general");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("view-clinic-patients"), "View Clinic Patients");
        assert_eq!(display_name("mark-bill-paid"), "Mark Bill Paid");
    }

    #[test]
    fn test_grouping_keeps_every_permission() {
        let groups = grouped_permissions(secretary_assignable());
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, secretary_assignable().len());
        assert!(is_secretary_assignable("delete-patient"));
        assert!(!is_secretary_assignable("manage-roles"));
    }
}
