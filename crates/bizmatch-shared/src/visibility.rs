//! What a viewer may see of an opportunity listing.
//!
//! Nothing here is stored; it is recomputed from the listing and the
//! viewer's [`PairState`] with the listing's owner every time a listing is
//! rendered.

use serde::{Deserialize, Serialize};

use crate::constants::HIDDEN_NAME_PLACEHOLDER;
use crate::policy::PairState;
use crate::types::AccountId;

/// Listing fields that visibility depends on.
#[derive(Debug, Clone, Copy)]
pub struct ListingFacts<'a> {
    pub owner: AccountId,
    pub business_name: &'a str,
    pub name_private: bool,
    pub contact_email: &'a str,
    pub contact_phone: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingVariant {
    /// Read-only rendering shown to the listing's owner.
    Own,
    Public,
    /// No session: only a sign-in prompt is offered.
    Anonymous,
}

/// The connect control shown next to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectAffordance {
    Hidden,
    SignIn,
    Connect,
    RequestAgain,
    /// Rendered disabled.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    pub variant: ListingVariant,
    pub display_name: String,
    /// The name is private but shown because the pair is connected.
    pub name_revealed: bool,
    pub contact: Option<ContactDetails>,
    pub connect: ConnectAffordance,
    pub can_favorite: bool,
    pub can_message: bool,
}

/// Derive the rendering of a listing for `viewer`.
pub fn derive_visibility(
    viewer: Option<AccountId>,
    listing: &ListingFacts<'_>,
    state: &PairState,
) -> Visibility {
    let real_name = listing.business_name.to_string();

    let Some(viewer) = viewer else {
        return Visibility {
            variant: ListingVariant::Anonymous,
            display_name: masked_name(listing, &PairState::None),
            name_revealed: false,
            contact: None,
            connect: ConnectAffordance::SignIn,
            can_favorite: false,
            can_message: false,
        };
    };

    if viewer == listing.owner {
        return Visibility {
            variant: ListingVariant::Own,
            display_name: real_name,
            name_revealed: false,
            contact: None,
            connect: ConnectAffordance::Hidden,
            can_favorite: false,
            can_message: false,
        };
    }

    let accepted = state.is_accepted();
    let connect = match state {
        PairState::None => ConnectAffordance::Connect,
        PairState::Pending { .. } => ConnectAffordance::Pending,
        PairState::Declined { requester, .. } if *requester == viewer => {
            ConnectAffordance::RequestAgain
        }
        PairState::Declined { .. } | PairState::Accepted | PairState::Blocked { .. } => {
            ConnectAffordance::Hidden
        }
    };

    Visibility {
        variant: ListingVariant::Public,
        display_name: masked_name(listing, state),
        name_revealed: listing.name_private && accepted,
        contact: accepted.then(|| ContactDetails {
            email: listing.contact_email.to_string(),
            phone: listing.contact_phone.to_string(),
        }),
        connect,
        can_favorite: !state.is_blocked(),
        can_message: accepted,
    }
}

/// Name to show for a listing given the pair state, ignoring ownership.
pub fn masked_name(listing: &ListingFacts<'_>, state: &PairState) -> String {
    if listing.name_private && !state.is_accepted() {
        HIDDEN_NAME_PLACEHOLDER.to_string()
    } else {
        listing.business_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(owner: AccountId, private: bool) -> ListingFacts<'static> {
        ListingFacts {
            owner,
            business_name: "Acme Industrial",
            name_private: private,
            contact_email: "sales@acme.test",
            contact_phone: "+1 555 0100",
        }
    }

    #[test]
    fn private_name_is_masked_until_accepted() {
        let owner = AccountId::new();
        let viewer = AccountId::new();
        let facts = listing(owner, true);

        for state in [
            PairState::None,
            PairState::Pending { requester: viewer, recipient: owner },
            PairState::Declined { requester: viewer, recipient: owner },
            PairState::Blocked { blocker: owner, blocked: viewer },
        ] {
            let view = derive_visibility(Some(viewer), &facts, &state);
            assert_eq!(view.display_name, HIDDEN_NAME_PLACEHOLDER);
            assert!(view.contact.is_none());
            assert!(!view.can_message);
        }

        let view = derive_visibility(Some(viewer), &facts, &PairState::Accepted);
        assert_eq!(view.display_name, "Acme Industrial");
        assert!(view.name_revealed);
        assert_eq!(view.contact.unwrap().email, "sales@acme.test");
        assert!(view.can_message);
    }

    #[test]
    fn public_name_is_always_shown_but_contact_is_not() {
        let owner = AccountId::new();
        let view = derive_visibility(Some(AccountId::new()), &listing(owner, false), &PairState::None);
        assert_eq!(view.display_name, "Acme Industrial");
        assert!(!view.name_revealed);
        assert!(view.contact.is_none());
        assert_eq!(view.connect, ConnectAffordance::Connect);
    }

    #[test]
    fn owner_gets_read_only_variant() {
        let owner = AccountId::new();
        let view = derive_visibility(Some(owner), &listing(owner, true), &PairState::None);
        assert_eq!(view.variant, ListingVariant::Own);
        assert_eq!(view.display_name, "Acme Industrial");
        assert_eq!(view.connect, ConnectAffordance::Hidden);
        assert!(!view.can_favorite && !view.can_message);
    }

    #[test]
    fn anonymous_viewer_is_prompted_to_sign_in() {
        let view = derive_visibility(None, &listing(AccountId::new(), true), &PairState::None);
        assert_eq!(view.variant, ListingVariant::Anonymous);
        assert_eq!(view.connect, ConnectAffordance::SignIn);
        assert_eq!(view.display_name, HIDDEN_NAME_PLACEHOLDER);
    }

    #[test]
    fn request_again_only_for_original_requester() {
        let owner = AccountId::new();
        let viewer = AccountId::new();
        let facts = listing(owner, false);
        let declined_by_owner = PairState::Declined { requester: viewer, recipient: owner };
        assert_eq!(
            derive_visibility(Some(viewer), &facts, &declined_by_owner).connect,
            ConnectAffordance::RequestAgain
        );
        let declined_by_viewer = PairState::Declined { requester: owner, recipient: viewer };
        assert_eq!(
            derive_visibility(Some(viewer), &facts, &declined_by_viewer).connect,
            ConnectAffordance::Hidden
        );
    }
}
