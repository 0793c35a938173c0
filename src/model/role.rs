#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    ApiUser = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::ApiUser),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Roles allowed to review leave, run payroll and manage the directory.
    pub fn is_manager(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips() {
        for id in 1..=5u8 {
            assert_eq!(Role::from_id(id).map(Role::id), Some(id));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(6), None);
    }

    #[test]
    fn only_admin_and_hr_manage() {
        assert!(Role::Admin.is_manager());
        assert!(Role::Hr.is_manager());
        assert!(!Role::Employee.is_manager());
        assert!(!Role::ApiUser.is_manager());
    }
}
