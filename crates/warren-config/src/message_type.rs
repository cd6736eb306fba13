//! Message type identity used to derive conventional names.

use std::fmt;

/// Identity of a message type: a dotted namespace, a short name and any
/// generic arguments.
///
/// Rust type paths (`my_app::orders::OrderPlaced`) are mapped to a dotted
/// namespace (`my_app.orders`) so that conventional exchange names look the
/// same regardless of the language the producer was written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageType {
    namespace: String,
    name: String,
    generic_arguments: Vec<MessageType>,
}

impl MessageType {
    /// Create a non-generic message type.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            generic_arguments: Vec::new(),
        }
    }

    /// Add a generic argument.
    pub fn with_generic_argument(mut self, argument: MessageType) -> Self {
        self.generic_arguments.push(argument);
        self
    }

    /// The message type of a Rust type, derived from its type path.
    pub fn of<T: ?Sized>() -> Self {
        Self::from_type_path(std::any::type_name::<T>())
    }

    /// Parse a Rust type path such as `core::option::Option<my::Event>`.
    pub fn from_type_path(path: &str) -> Self {
        let path = path.trim();
        let is_compound = path.starts_with(|c: char| matches!(c, '(' | '[' | '&' | '*'));

        let (base, generic_arguments) = match path.find('<') {
            Some(open) if !is_compound && path.ends_with('>') => (
                &path[..open],
                split_top_level(&path[open + 1..path.len() - 1])
                    .into_iter()
                    .map(MessageType::from_type_path)
                    .collect(),
            ),
            _ => (path, Vec::new()),
        };

        let (namespace, name) = match base.rfind("::") {
            Some(idx) if !is_compound => (base[..idx].replace("::", "."), &base[idx + 2..]),
            _ => (String::new(), base),
        };

        Self {
            namespace,
            name: name.to_string(),
            generic_arguments,
        }
    }

    /// Dotted namespace, empty for types without a path.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Short name without namespace or generic arguments.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generic_arguments(&self) -> &[MessageType] {
        &self.generic_arguments
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_arguments.is_empty()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.namespace.is_empty() {
            write!(f, "{}.", self.namespace)?;
        }
        f.write_str(&self.name)?;
        if self.is_generic() {
            f.write_str("<")?;
            for (i, arg) in self.generic_arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Split a generic argument list on commas that are not nested.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in list.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(list[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    let last = list[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    mod orders {
        pub struct OrderPlaced;
    }

    #[test]
    fn test_of_uses_module_path() {
        let ty = MessageType::of::<orders::OrderPlaced>();
        assert_eq!(ty.name(), "OrderPlaced");
        assert!(ty.namespace().ends_with("message_type.tests.orders"));
        assert!(!ty.is_generic());
    }

    #[test]
    fn test_from_type_path_generic() {
        let ty = MessageType::from_type_path("core::option::Option<my_app::events::Ping>");
        assert_eq!(ty.namespace(), "core.option");
        assert_eq!(ty.name(), "Option");
        assert_eq!(ty.generic_arguments().len(), 1);
        assert_eq!(ty.generic_arguments()[0].namespace(), "my_app.events");
        assert_eq!(ty.generic_arguments()[0].name(), "Ping");
    }

    #[test]
    fn test_from_type_path_nested_generics() {
        let ty = MessageType::from_type_path(
            "std::collections::hash::map::HashMap<alloc::string::String, alloc::vec::Vec<u8>>",
        );
        assert_eq!(ty.name(), "HashMap");
        assert_eq!(ty.generic_arguments().len(), 2);
        assert_eq!(ty.generic_arguments()[1].name(), "Vec");
        assert_eq!(ty.generic_arguments()[1].generic_arguments()[0].name(), "u8");
    }

    #[test]
    fn test_from_type_path_without_namespace() {
        let ty = MessageType::from_type_path("u32");
        assert_eq!(ty.namespace(), "");
        assert_eq!(ty.name(), "u32");

        let tuple = MessageType::from_type_path("(a::B, c::D)");
        assert_eq!(tuple.namespace(), "");
        assert_eq!(tuple.name(), "(a::B, c::D)");
    }

    #[test]
    fn test_display() {
        let ty = MessageType::new("shop.orders", "Envelope")
            .with_generic_argument(MessageType::new("shop.orders", "OrderPlaced"));
        assert_eq!(ty.to_string(), "shop.orders.Envelope<shop.orders.OrderPlaced>");
    }
}
