//! Configuration schema export

use serde_json::Value;

use crate::agent::Agent;

/// JSON Schema of an agent's configuration, or `None` if it takes none.
///
/// `$id` and `title` are filled in only when the schema does not set them.
pub fn inspect<A: Agent>() -> Option<Value> {
    let mut schema = A::config_schema()?.to_json_schema();
    let name = A::agent_name();

    if let Value::Object(map) = &mut schema {
        map.entry("$id")
            .or_insert_with(|| Value::String(format!("urn:agent-config:{name}:1.0.0")));
        map.entry("title")
            .or_insert_with(|| Value::String(format!("{name}Config")));
    }

    Some(schema)
}
