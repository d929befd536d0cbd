//! Interactive selection of a credentials profile.

use std::fmt;

use crate::{
    error::{Error, Result},
    prompt::{Prompter, take_selected},
    store::ProfileStore,
};

/// A profile as shown in the picker: `<account>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLabel {
    pub account: String,
    pub name: String,
}

impl fmt::Display for ProfileLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.name)
    }
}

/// Labels for every section of the store, sorted by their display form.
pub fn labels(store: &ProfileStore) -> Vec<ProfileLabel> {
    let mut labels: Vec<ProfileLabel> = store
        .names()
        .into_iter()
        .map(|name| ProfileLabel {
            account: store.account_id(&name),
            name,
        })
        .collect();
    labels.sort_by_cached_key(ToString::to_string);
    labels
}

/// Shell statement activating `profile`.
pub fn export_statement(profile: &str) -> String {
    format!("export AWS_PROFILE={profile}")
}

/// Asks the user for a profile and returns its name.
pub fn select_profile<P: Prompter>(store: &ProfileStore, prompter: &P) -> Result<String> {
    let labels = labels(store);
    if labels.is_empty() {
        return Err(Error::NoProfiles(store.path().to_path_buf()));
    }

    let options: Vec<String> = labels.iter().map(ToString::to_string).collect();
    let index = prompter.select("Choose a profile", &options, 0)?;
    take_selected(labels, index).map(|label| label.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::Validator;

    const CREDENTIALS: &str = "\
[zeta]
aws_access_key_id = a

[beta-mfa]
aws_mfa_device = arn:aws:iam::999999999999:mfa/foo

[alpha]
role_arn = arn:aws:iam::111111111111:role/admin

[gamma]
role_arn = arn:aws:iam::999999999999:role/read
";

    struct PickLast;

    impl Prompter for PickLast {
        fn select(&self, _prompt: &str, items: &[String], default: usize) -> Result<usize> {
            assert_eq!(default, 0);
            Ok(items.len() - 1)
        }

        fn input(&self, _prompt: &str, _validate: Validator) -> Result<String> {
            unreachable!("the selector never asks for text")
        }
    }

    #[test]
    fn labels_are_sorted_with_account() {
        let store = ProfileStore::parse("credentials", CREDENTIALS).unwrap();
        let labels: Vec<String> = labels(&store).iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            [
                "111111111111/alpha",
                "999999999999/beta-mfa",
                "999999999999/gamma",
                "????????????/zeta",
            ]
        );
    }

    #[test]
    fn labels_are_stable() {
        let store = ProfileStore::parse("credentials", CREDENTIALS).unwrap();
        assert_eq!(labels(&store), labels(&store));
    }

    #[test]
    fn selection_returns_the_profile_name() {
        let store = ProfileStore::parse("credentials", CREDENTIALS).unwrap();
        assert_eq!(select_profile(&store, &PickLast).unwrap(), "zeta");
        assert_eq!(export_statement("zeta"), "export AWS_PROFILE=zeta");
    }

    #[test]
    fn unknown_selection_is_not_a_cancellation() {
        struct PickPastEnd;

        impl Prompter for PickPastEnd {
            fn select(&self, _prompt: &str, items: &[String], _default: usize) -> Result<usize> {
                Ok(items.len())
            }

            fn input(&self, _prompt: &str, _validate: Validator) -> Result<String> {
                unreachable!("the selector never asks for text")
            }
        }

        let store = ProfileStore::parse("credentials", CREDENTIALS).unwrap();
        assert!(matches!(
            select_profile(&store, &PickPastEnd),
            Err(Error::Prompt(_))
        ));
    }

    #[test]
    fn empty_store_has_nothing_to_select() {
        let store = ProfileStore::parse("credentials", "").unwrap();
        assert!(matches!(
            select_profile(&store, &PickLast),
            Err(Error::NoProfiles(_))
        ));
    }
}
