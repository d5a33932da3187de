use serde::{Deserialize, Serialize};

/// Server-assigned message identifier.
///
/// Ids are totally ordered by send order, so comparing two ids tells which
/// message the server accepted first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_is_a_bare_integer_on_the_wire() {
        let json = serde_json::to_string(&MessageId(42)).unwrap();
        assert_eq!(json, "42");

        let id: MessageId = serde_json::from_str("7").unwrap();
        assert_eq!(id, MessageId(7));
    }

    #[test]
    fn test_message_id_ordering() {
        assert!(MessageId(8) < MessageId(9));
        assert_eq!(MessageId::from(3).get(), 3);
    }
}
