use rust_decimal::Decimal;

/// A monetary amount, fixed-point with 2 fractional digits.
///
/// Always [`rust_decimal::Decimal`], never a float: exact-match scoring (§4.4.1) compares
/// amounts to the cent and must not be subject to floating-point rounding.
pub type Money = Decimal;

/// An exchange rate, fixed-point with 8 fractional digits.
pub type Rate = Decimal;

/// An ISO-4217 currency code, e.g. `"EUR"`.
pub type CurrencyCode = String;
