//! Conventional names for exchanges, queues and routing keys.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::message_type::MessageType;

const MAX_NAME_LENGTH: usize = 254;
const TRUNCATED_TAIL_LENGTH: usize = 250;

/// Derives broker entity names from message types.
///
/// The subscriber counter used by [`subscriber_queue_suffix`] is owned by the
/// instance, so two `NamingConventions` never influence each other.
///
/// [`subscriber_queue_suffix`]: NamingConventions::subscriber_queue_suffix
#[derive(Debug)]
pub struct NamingConventions {
    application_name: String,
    subscriber_counter: Mutex<HashMap<MessageType, usize>>,
}

impl NamingConventions {
    /// Create conventions using the name of the running executable.
    pub fn new() -> Self {
        Self::with_application_name(detect_application_name())
    }

    /// Create conventions with an explicit application name.
    ///
    /// The name is lowercased and dots are replaced with underscores.
    pub fn with_application_name(name: impl AsRef<str>) -> Self {
        Self {
            application_name: name.as_ref().replace('.', "_").to_lowercase(),
            subscriber_counter: Mutex::new(HashMap::new()),
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Exchange name: the lowercased namespace.
    pub fn exchange_name(&self, message_type: &MessageType) -> String {
        message_type.namespace().to_lowercase()
    }

    /// Queue name: the short, lowercased type name.
    pub fn queue_name(&self, message_type: &MessageType) -> String {
        short_afqn(message_type)
    }

    /// Routing key: the short, lowercased type name.
    pub fn routing_key(&self, message_type: &MessageType) -> String {
        short_afqn(message_type)
    }

    pub fn error_exchange_name(&self) -> String {
        "default_error_exchange".to_string()
    }

    pub fn retry_later_exchange_name(&self, _delay: Duration) -> String {
        "default_retry_later_exchange".to_string()
    }

    pub fn retry_later_queue_name(&self, exchange: &str, delay: Duration) -> String {
        format!(
            "retry_for_{}_in_{}_ms",
            exchange.replace('.', "_"),
            delay.as_millis()
        )
    }

    /// Suffix that keeps subscriber queues for the same type unique.
    ///
    /// The first subscriber of a type gets the application name, later ones
    /// get `_1`, `_2`, ... appended.
    pub fn subscriber_queue_suffix(&self, message_type: &MessageType) -> String {
        let mut counter = self.subscriber_counter.lock();
        match counter.get_mut(message_type) {
            Some(count) => {
                *count += 1;
                format!("{}_{}", self.application_name, count)
            }
            None => {
                counter.insert(message_type.clone(), 0);
                self.application_name.clone()
            }
        }
    }
}

impl Default for NamingConventions {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_application_name() -> String {
    let from_exe = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()));

    from_exe
        .or_else(|| {
            std::env::args().next().and_then(|arg| {
                std::path::Path::new(&arg)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
        })
        .unwrap_or_default()
}

fn short_afqn(message_type: &MessageType) -> String {
    let full = append_type_name(message_type, String::new());
    let chars: Vec<char> = full.chars().collect();
    let shortened = if chars.len() > MAX_NAME_LENGTH {
        let tail: String = chars[chars.len() - TRUNCATED_TAIL_LENGTH..].iter().collect();
        format!("...{tail}")
    } else {
        full
    };
    shortened.to_lowercase()
}

fn append_type_name(message_type: &MessageType, mut out: String) -> String {
    out.push_str(message_type.name());
    if message_type.is_generic() {
        out.push('[');
        for (i, arg) in message_type.generic_arguments().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out = append_type_name(arg, out);
        }
        out.push(']');
    }
    out
}
