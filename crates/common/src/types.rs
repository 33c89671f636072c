use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Short unique identifier for an order.
///
/// Three printable digits, zero-padded (`"000"`–`"999"`). The small space is
/// deliberate: ids are typed by hand in chat commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

/// Error returned when a string is not a valid order id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid order id: {0:?} (expected 3 digits)")]
pub struct InvalidOrderId(pub String);

impl OrderId {
    /// Number of ids in the space (`000`–`999`).
    pub const SPACE: u16 = 1000;

    /// Creates an order id from a numeric value, zero-padded to 3 digits.
    pub fn from_number(n: u16) -> Self {
        Self(format!("{:03}", n % Self::SPACE))
    }

    /// Parses an order id, requiring exactly 3 ASCII digits.
    pub fn parse(s: &str) -> Result<Self, InvalidOrderId> {
        if s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidOrderId(s.to_string()))
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for OrderId {
    type Err = InvalidOrderId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a user (customer or worker).
    ///
    /// Wraps the chat platform's snowflake string to prevent mixing it up
    /// with other string-based identifiers.
    UserId
}

string_id! {
    /// Identifier of the guild an order originated from.
    GuildId
}

string_id! {
    /// Identifier of the channel an order originated from.
    ChannelId
}

/// How a finished order is handed to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// Send the delivery message straight to the customer's DMs.
    Dm,
    /// Post the delivery message in the order's origin channel.
    Bot,
    /// The deliverer brings the order over in person, using a single-use
    /// invite to the order's channel.
    Personal,
}

impl DeliveryMethod {
    /// Returns the method name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Dm => "dm",
            DeliveryMethod::Bot => "bot",
            DeliveryMethod::Personal => "personal",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string names no known delivery method.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown delivery method: {0:?} (expected dm, bot or personal)")]
pub struct UnknownDeliveryMethod(pub String);

impl std::str::FromStr for DeliveryMethod {
    type Err = UnknownDeliveryMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dm" => Ok(DeliveryMethod::Dm),
            "bot" => Ok(DeliveryMethod::Bot),
            "personal" => Ok(DeliveryMethod::Personal),
            other => Err(UnknownDeliveryMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_from_number_zero_pads() {
        assert_eq!(OrderId::from_number(7).as_str(), "007");
        assert_eq!(OrderId::from_number(42).as_str(), "042");
        assert_eq!(OrderId::from_number(999).as_str(), "999");
    }

    #[test]
    fn order_id_parse_accepts_three_digits() {
        assert_eq!(OrderId::parse("000").unwrap().as_str(), "000");
        assert_eq!(OrderId::parse("123").unwrap().as_str(), "123");
    }

    #[test]
    fn order_id_parse_rejects_invalid() {
        assert!(OrderId::parse("").is_err());
        assert!(OrderId::parse("12").is_err());
        assert!(OrderId::parse("1234").is_err());
        assert!(OrderId::parse("12a").is_err());
    }

    #[test]
    fn order_id_serialization_roundtrip() {
        let id = OrderId::from_number(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"042\"");
        let deserialized: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn user_id_string_conversion() {
        let id = UserId::new("123456789");
        assert_eq!(id.as_str(), "123456789");

        let id2: UserId = "987654321".into();
        assert_eq!(id2.as_str(), "987654321");
    }

    #[test]
    fn delivery_method_parse() {
        assert_eq!("dm".parse::<DeliveryMethod>().unwrap(), DeliveryMethod::Dm);
        assert_eq!(
            "bot".parse::<DeliveryMethod>().unwrap(),
            DeliveryMethod::Bot
        );
        assert_eq!(
            "personal".parse::<DeliveryMethod>().unwrap(),
            DeliveryMethod::Personal
        );
        assert!("carrier-pigeon".parse::<DeliveryMethod>().is_err());
    }

    #[test]
    fn delivery_method_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DeliveryMethod::Personal).unwrap(),
            "\"personal\""
        );
    }
}
