use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point monetary value, non-negative, at most two decimal places.
///
/// Construction rejects values that would need rounding; amounts are never
/// silently truncated. Balances and transaction amounts are both `Money`,
/// so subtraction below zero is unrepresentable (`checked_sub` returns
/// `None`), which is what the non-negativity invariant leans on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(Decimal);

impl Money {
    pub const SCALE: u32 = 2;

    pub fn zero() -> Self {
        let mut z = Decimal::ZERO;
        z.rescale(Self::SCALE);
        Self(z)
    }

    /// Wrap a decimal, rejecting negative values and sub-cent precision.
    pub fn new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return None;
        }
        let mut normalized = value.normalize();
        if normalized.scale() > Self::SCALE {
            return None;
        }
        normalized.rescale(Self::SCALE);
        Some(Self(normalized))
    }

    pub fn parse(s: &str) -> Option<Self> {
        let value: Decimal = s.trim().parse().ok()?;
        Self::new(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// `None` when `other` exceeds `self`; a negative result has no
    /// representation here.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        let diff = self.0.checked_sub(other.0)?;
        if diff.is_sign_negative() {
            return None;
        }
        Some(Money(diff))
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid money value: {}", s)))
    }
}

/// ISO 4217-style three-letter currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency([u8; 3]);

impl Currency {
    pub const PHP: Currency = Currency(*b"PHP");

    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        Some(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII uppercase.
        core::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Currency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Currency::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid currency code: {}", s)))
    }
}
