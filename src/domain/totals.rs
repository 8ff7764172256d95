use super::money::{self, checked_add, checked_div, checked_mul, checked_sub};
use crate::error::AmountError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A discount as entered on a quote, invoice, bill or purchase order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    Flat(Decimal),
    /// Percentage of the subtotal, `5` meaning 5%.
    Percentage(Decimal),
}

impl Default for Discount {
    fn default() -> Self {
        Discount::Flat(Decimal::ZERO)
    }
}

impl Discount {
    /// The discount as an amount of `subtotal`. Not rounded.
    pub fn resolve(&self, subtotal: Decimal) -> Result<Decimal, AmountError> {
        match self {
            Discount::Flat(amount) => Ok(*amount),
            Discount::Percentage(rate) => {
                checked_div(checked_mul(subtotal, *rate)?, Decimal::ONE_HUNDRED)
            }
        }
    }
}

/// Final total of a document.
///
/// With `tax_inclusive` the tax is already embedded in `subtotal` and is not
/// added again. The result is rounded half-up to the minor unit exactly once.
pub fn compute_document_total(
    subtotal: Decimal,
    discount: Decimal,
    tax: Decimal,
    tax_inclusive: bool,
) -> Result<Decimal, AmountError> {
    let mut total = checked_sub(subtotal, discount)?;
    if !tax_inclusive {
        total = checked_add(total, tax)?;
    }
    Ok(money::round_minor(total))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Tax rate in percent.
    #[serde(default)]
    pub tax_rate: Decimal,
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            tax_rate,
        }
    }

    pub fn amount(&self) -> Result<Decimal, AmountError> {
        checked_mul(self.quantity, self.unit_price)
    }
}

/// Rolled-up figures of a document built from line items.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl DocumentTotals {
    /// Sums the lines without rounding, spreads the discount over them in
    /// proportion to their amounts, and taxes what remains of each line.
    ///
    /// Only the reported figures are rounded; `total` comes from the
    /// unrounded parts through [`compute_document_total`].
    pub fn from_lines(
        lines: &[LineItem],
        discount: Discount,
        tax_inclusive: bool,
    ) -> Result<Self, AmountError> {
        let subtotal = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| checked_add(acc, line.amount()?))?;
        let discount = discount.resolve(subtotal)?;

        let retained = if subtotal.is_zero() {
            Decimal::ONE
        } else {
            checked_div(checked_sub(subtotal, discount)?, subtotal)?
        };
        let tax = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
            let base = checked_mul(line.amount()?, retained)?;
            let rate = checked_div(line.tax_rate, Decimal::ONE_HUNDRED)?;
            let mut line_tax = checked_mul(base, rate)?;
            if tax_inclusive {
                line_tax = checked_div(line_tax, checked_add(Decimal::ONE, rate)?)?;
            }
            checked_add(acc, line_tax)
        })?;

        Ok(Self {
            subtotal: money::round_minor(subtotal),
            discount: money::round_minor(discount),
            tax: money::round_minor(tax),
            total: compute_document_total(subtotal, discount, tax, tax_inclusive)?,
        })
    }
}
