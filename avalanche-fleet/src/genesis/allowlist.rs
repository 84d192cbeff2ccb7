use std::{collections::BTreeMap, fmt};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{Error, Result},
    prompt::{select, ListDecision, Prompter, LIST_DECISIONS},
};

/// Addresses permitted to use a precompile, by role.
/// ref. https://docs.avax.network/build/subnet/upgrade/customize-a-subnet#allowlist-interface
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AllowList {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manager_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_addresses: Vec<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Role {
    Admin,
    Manager,
    Enabled,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::Manager => write!(f, "Manager"),
            Role::Enabled => write!(f, "Enabled"),
        }
    }
}

pub const ROLES: [Role; 3] = [Role::Admin, Role::Manager, Role::Enabled];

impl AllowList {
    pub fn is_empty(&self) -> bool {
        self.admin_addresses.is_empty()
            && self.manager_addresses.is_empty()
            && self.enabled_addresses.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses().any(|a| a.eq_ignore_ascii_case(address))
    }

    fn addresses(&self) -> impl Iterator<Item = &String> {
        self.admin_addresses
            .iter()
            .chain(self.manager_addresses.iter())
            .chain(self.enabled_addresses.iter())
    }

    fn list_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Admin => &mut self.admin_addresses,
            Role::Manager => &mut self.manager_addresses,
            Role::Enabled => &mut self.enabled_addresses,
        }
    }

    /// Adds the address under the role. Returns false if it is already listed under any role.
    pub fn add(&mut self, role: Role, address: &str) -> bool {
        if self.contains(address) {
            return false;
        }
        self.list_mut(role).push(address.to_string());
        true
    }

    pub fn remove(&mut self, address: &str) -> bool {
        let mut removed = false;
        for role in ROLES {
            let list = self.list_mut(role);
            let before = list.len();
            list.retain(|a| !a.eq_ignore_ascii_case(address));
            removed |= list.len() != before;
        }
        removed
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (role, list) in [
            (Role::Admin, &self.admin_addresses),
            (Role::Manager, &self.manager_addresses),
            (Role::Enabled, &self.enabled_addresses),
        ] {
            out.push_str(&format!("{role}:\n"));
            for a in list {
                out.push_str(&format!("  {a}\n"));
            }
        }
        out
    }
}

/// Interactively edits an allow list. Returns None when the operator cancels.
pub fn prompt_allow_list(prompter: &dyn Prompter, title: &str) -> Result<Option<AllowList>> {
    let mut list = AllowList::default();
    prompter.info(&format!("Configure the addresses allowed to interact with the {title}"));
    loop {
        match select(prompter, "Configure the allow list", &LIST_DECISIONS)? {
            ListDecision::Add => {
                let role = select(prompter, "Which role should the address have?", &ROLES)?;
                let address = prompter.capture_address("Enter the address")?;
                if !list.add(role, &address) {
                    prompter.info(&format!("address {address} is already in the list"));
                }
            }
            ListDecision::Remove => {
                let all: Vec<String> = list.addresses().cloned().collect();
                if all.is_empty() {
                    prompter.info("the list is empty");
                    continue;
                }
                let idx = prompter.capture_index("Which address should be removed?", &all)?;
                list.remove(&all[idx]);
            }
            ListDecision::Preview => prompter.info(&list.render()),
            ListDecision::Done => {
                if list.is_empty() {
                    prompter.info("add at least one address before finishing");
                    continue;
                }
                return Ok(Some(list));
            }
            ListDecision::Cancel => return Ok(None),
        }
    }
}

/// Fails unless at least one admin holds a non-zero balance.
/// Without it nobody could transact on a chain gated by the transaction allow list.
pub fn ensure_admins_have_balance(admins: &[String], alloc: &BTreeMap<String, U256>) -> Result<()> {
    if admins.is_empty() {
        return Ok(());
    }
    let funded = admins.iter().any(|admin| {
        alloc
            .iter()
            .any(|(addr, bal)| addr.eq_ignore_ascii_case(admin) && !bal.is_zero())
    });
    if funded {
        Ok(())
    } else {
        Err(Error::other(
            "none of the addresses in the transaction allow list precompile have any tokens allocated to them; airdrop some funds to one of the allow list addresses to continue",
        ))
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::allowlist::test_allow_list_edit --exact --show-output
#[test]
fn test_allow_list_edit() {
    use crate::prompt::{Answer, Scripted};

    let a = "0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC";
    let b = "0x0000000000000000000000000000000000000001";
    let p = Scripted::new(vec![
        // done on an empty list is refused
        Answer::choose(ListDecision::Done),
        Answer::choose(ListDecision::Add),
        Answer::choose(Role::Admin),
        Answer::Text(a.to_string()),
        Answer::choose(ListDecision::Add),
        Answer::choose(Role::Enabled),
        Answer::Text(b.to_string()),
        // duplicates are ignored
        Answer::choose(ListDecision::Add),
        Answer::choose(Role::Manager),
        Answer::Text(b.to_string()),
        Answer::choose(ListDecision::Preview),
        Answer::choose(ListDecision::Done),
    ]);
    let list = prompt_allow_list(&p, "native minter").unwrap().unwrap();
    assert_eq!(list.admin_addresses, vec![a.to_string()]);
    assert!(list.manager_addresses.is_empty());
    assert_eq!(list.enabled_addresses, vec![b.to_string()]);
    assert_eq!(p.remaining(), 0);

    let p = Scripted::new(vec![Answer::choose(ListDecision::Cancel)]);
    assert!(prompt_allow_list(&p, "native minter").unwrap().is_none());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::allowlist::test_ensure_admins_have_balance --exact --show-output
#[test]
fn test_ensure_admins_have_balance() {
    let admin = "0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC".to_string();
    let mut alloc = BTreeMap::new();
    assert!(ensure_admins_have_balance(&[], &alloc).is_ok());
    assert!(ensure_admins_have_balance(&[admin.clone()], &alloc).is_err());

    alloc.insert(admin.to_lowercase(), U256::zero());
    assert!(ensure_admins_have_balance(&[admin.clone()], &alloc).is_err());

    alloc.insert(admin.to_lowercase(), U256::from(1));
    assert!(ensure_admins_have_balance(&[admin], &alloc).is_ok());
}
