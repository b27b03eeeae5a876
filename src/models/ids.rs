//! Newtype wrappers for Wave entity identifiers.
//!
//! Wave hands out opaque base64 strings for every entity. Wrapping them
//! keeps a product id from being passed where an account id is expected.

use serde::{Deserialize, Serialize};

/// Macro to define a newtype ID wrapping a `String` inner type.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the given string.
            #[inline]
            #[must_use]
            pub const fn new(value: String) -> Self {
                Self(value)
            }

            /// Returns a reference to the inner string.
            #[inline]
            #[must_use]
            pub fn as_inner(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Returns `true` if the identifier is empty or whitespace only.
            #[inline]
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl core::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

define_string_id! {
    /// Identifier of a Wave business.
    BusinessId
}

define_string_id! {
    /// Identifier of a Wave customer. Empty until the customer is created.
    CustomerId
}

define_string_id! {
    /// Identifier of a Wave invoice.
    InvoiceId
}

define_string_id! {
    /// Identifier of a Wave product (invoice line item target).
    ProductId
}

define_string_id! {
    /// Identifier of a Wave ledger account (payment target).
    AccountId
}

define_string_id! {
    /// Identifier of a recorded invoice payment.
    PaymentId
}
