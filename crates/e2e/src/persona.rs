//! Test personas and the roles they exercise

use std::fmt;

/// Password shared by every persona created for a run.
pub const PERSONA_PASSWORD: &str = "senha123";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Administrator,
    Salesperson,
    StockClerk,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Salesperson, Role::StockClerk];

    /// Value understood by the account-creation tool's `-role` flag.
    pub fn as_arg(&self) -> &'static str {
        match self {
            Role::Administrator => "admin",
            Role::Salesperson => "vendedor",
            Role::StockClerk => "estoquista",
        }
    }

    /// Non-administrator accounts are scoped to a branch.
    pub fn requires_branch(&self) -> bool {
        !matches!(self, Role::Administrator)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|r| r.as_arg() == value)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Administrator => "administrator",
            Role::Salesperson => "salesperson",
            Role::StockClerk => "stock-clerk",
        };
        f.write_str(label)
    }
}

/// Account to create before any scenario runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaSpec {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password: String,
}

impl PersonaSpec {
    pub fn new(role: Role, name: &str, email: &str) -> Self {
        Self {
            role,
            name: name.to_string(),
            email: email.to_string(),
            password: PERSONA_PASSWORD.to_string(),
        }
    }

    /// The three accounts every run needs.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(Role::Administrator, "Admin Teste", "admin@teste.com"),
            Self::new(Role::Salesperson, "Vendedor Teste", "vendedor@teste.com"),
            Self::new(Role::StockClerk, "Estoquista Teste", "estoquista@teste.com"),
        ]
    }

    /// Bind to a branch, producing the account the creator tool is given.
    pub fn bind(&self, branch: Option<&str>) -> Persona {
        Persona {
            role: self.role,
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            branch: if self.role.requires_branch() {
                branch.map(str::to_string)
            } else {
                None
            },
        }
    }
}

/// A created account. Never mutated after provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password: String,
    pub branch: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Role::Administrator, "admin", false)]
    #[test_case(Role::Salesperson, "vendedor", true)]
    #[test_case(Role::StockClerk, "estoquista", true)]
    fn test_role_contract(role: Role, arg: &str, needs_branch: bool) {
        assert_eq!(role.as_arg(), arg);
        assert_eq!(role.requires_branch(), needs_branch);
        assert_eq!(Role::parse(arg), Some(role));
    }

    #[test]
    fn test_admin_never_bound_to_branch() {
        let specs = PersonaSpec::defaults();
        let personas: Vec<Persona> = specs.iter().map(|s| s.bind(Some("b-1"))).collect();

        assert_eq!(personas[0].branch, None);
        assert_eq!(personas[1].branch.as_deref(), Some("b-1"));
        assert_eq!(personas[2].branch.as_deref(), Some("b-1"));
    }

    #[test]
    fn test_defaults_cover_every_role_once() {
        let specs = PersonaSpec::defaults();
        for role in Role::ALL {
            assert_eq!(specs.iter().filter(|s| s.role == role).count(), 1);
        }
    }
}
