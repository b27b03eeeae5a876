//! Invoice payment input and result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Account, BusinessId, InvoiceId, PaymentId};

/// How a payment was received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer.
    BankTransfer,
    /// Cash.
    Cash,
    /// Cheque.
    Cheque,
    /// Credit card.
    CreditCard,
    /// `PayPal`.
    Paypal,
    /// Anything else; Upwork withdrawals land here.
    #[default]
    Other,
}

impl PaymentMethod {
    /// Wire name of the method.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::Cash => "cash",
            Self::Cheque => "cheque",
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::Other => "other",
        }
    }
}

impl core::fmt::Display for PaymentMethod {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment to record against an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInput {
    /// Business owning the invoice.
    pub business_id: BusinessId,
    /// Invoice being paid.
    pub invoice_id: InvoiceId,
    /// Account the money was deposited into.
    pub account: Account,
    /// Amount paid.
    pub amount: f64,
    /// Payment date.
    pub payment_date: NaiveDate,
    /// Payment method.
    pub method: PaymentMethod,
    /// Memo text.
    pub memo: Option<String>,
}

/// A recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Identifier assigned by Wave.
    pub id: PaymentId,
}
