//! Action-tagged automation commands (`{"action": ..., "data": {...}}`).
//!
//! A command edits the document's JSON value and the result goes through the
//! same validation and repair as a hand edit of the text.

use super::{Document, DocumentError, RepairReport};
use crate::constraint::generate_constraint_id;
use crate::model::next_entity_number;
use crate::shapes::entity_id;
use serde::Deserialize;
use serde_json::{Map, Value, json};

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    data: Value,
}

/// A decoded automation command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append an entity; one without an id receives the next `entity_<N>`.
    AddEntity(Map<String, Value>),
    RemoveEntity { entity_id: String },
    /// Shallow-merge `updates` into the entity record.
    UpdateEntity {
        entity_id: String,
        updates: Map<String, Value>,
    },
    /// Append a constraint; one without an id receives a generated id.
    AddConstraint(Map<String, Value>),
    ClearCanvas,
}

/// The validated document after a command, plus a summary for the caller.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub document: Document,
    pub result: Value,
    pub report: RepairReport,
}

fn object_field(data: &Value, key: &str, action: &str) -> Result<Map<String, Value>, DocumentError> {
    // Accept both {"entity": {...}} and the bare record.
    let record = data.get(key).unwrap_or(data);
    record
        .as_object()
        .cloned()
        .ok_or_else(|| DocumentError::Validation(format!("{action} requires data.{key} to be an object")))
}

fn entity_id_field(data: &Value, action: &str) -> Result<String, DocumentError> {
    data.get("entityId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DocumentError::Validation(format!("{action} requires data.entityId")))
}

fn has_id(record: &Map<String, Value>) -> bool {
    record.get("id").and_then(Value::as_str).is_some_and(|id| !id.is_empty())
}

impl Command {
    /// Decode a command envelope.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let envelope: Envelope =
            serde_json::from_value(value).map_err(|e| DocumentError::Validation(e.to_string()))?;
        let action = envelope
            .action
            .ok_or_else(|| DocumentError::Validation("No action specified".to_string()))?;
        let data = envelope.data;
        match action.as_str() {
            "add_entity" => Ok(Command::AddEntity(object_field(&data, "entity", &action)?)),
            "remove_entity" => Ok(Command::RemoveEntity {
                entity_id: entity_id_field(&data, &action)?,
            }),
            "update_entity" => {
                let entity_id = entity_id_field(&data, &action)?;
                let updates = data
                    .get("updates")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| DocumentError::Validation("update_entity requires data.updates".to_string()))?;
                Ok(Command::UpdateEntity { entity_id, updates })
            }
            "add_constraint" => Ok(Command::AddConstraint(object_field(&data, "constraint", &action)?)),
            "clear_canvas" => Ok(Command::ClearCanvas),
            _ => Err(DocumentError::UnknownAction(action)),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::AddEntity(_) => "add_entity",
            Command::RemoveEntity { .. } => "remove_entity",
            Command::UpdateEntity { .. } => "update_entity",
            Command::AddConstraint(_) => "add_constraint",
            Command::ClearCanvas => "clear_canvas",
        }
    }

    /// Apply the command to `document`, returning the validated result.
    ///
    /// `next_id` is the caller's entity id counter; a generated id is never
    /// below it, so ids of deleted entities are not handed out again.
    /// `document` itself is never modified; on error the caller keeps it.
    pub fn apply(self, document: &Document, default_color: &str, next_id: u64) -> Result<CommandOutcome, DocumentError> {
        let mut value = document
            .to_value()
            .map_err(|e| DocumentError::Validation(e.to_string()))?;
        let root = value
            .as_object_mut()
            .ok_or_else(|| DocumentError::Validation("document must be an object".to_string()))?;

        let (message, subject) = match self {
            Command::AddEntity(mut record) => {
                if !has_id(&record) {
                    let id = entity_id(next_entity_number(&document.entities).max(next_id));
                    record.insert("id".to_string(), Value::String(id));
                }
                let id = record.get("id").cloned().unwrap_or(Value::Null);
                push(root, "entities", Value::Object(record))?;
                ("Entity added", Subject::Entity(id))
            }
            Command::RemoveEntity { entity_id } => {
                let entities = array_mut(root, "entities")?;
                let index = position(entities, &entity_id)
                    .ok_or_else(|| DocumentError::EntityNotFound(entity_id.clone()))?;
                entities.remove(index);
                ("Entity removed", Subject::EntityId(entity_id))
            }
            Command::UpdateEntity { entity_id, updates } => {
                let entities = array_mut(root, "entities")?;
                let index = position(entities, &entity_id)
                    .ok_or_else(|| DocumentError::EntityNotFound(entity_id.clone()))?;
                if let Some(record) = entities[index].as_object_mut() {
                    for (key, update) in updates {
                        record.insert(key, update);
                    }
                }
                let id = entities[index].get("id").cloned().unwrap_or(Value::Null);
                ("Entity updated", Subject::Entity(id))
            }
            Command::AddConstraint(mut record) => {
                if !has_id(&record) {
                    let id = generate_constraint_id(&document.constraints);
                    record.insert("id".to_string(), Value::String(id));
                }
                let id = record.get("id").cloned().unwrap_or(Value::Null);
                push(root, "constraints", Value::Object(record))?;
                ("Constraint added", Subject::Constraint(id))
            }
            Command::ClearCanvas => {
                root.insert("entities".to_string(), Value::Array(Vec::new()));
                root.insert("constraints".to_string(), Value::Array(Vec::new()));
                ("Canvas cleared", Subject::None)
            }
        };

        let (document, report) = Document::from_value(value, default_color)?;
        let result = match subject {
            Subject::Entity(id) => {
                let entity = document.entities.iter().find(|e| Some(e.id.as_str()) == id.as_str());
                json!({ "message": message, "entity": entity })
            }
            Subject::EntityId(id) => json!({ "message": message, "entityId": id }),
            Subject::Constraint(id) => {
                let constraint = document
                    .constraints
                    .iter()
                    .find(|c| Some(c.id.as_str()) == id.as_str())
                    .ok_or_else(|| {
                        DocumentError::Validation(
                            "constraint references unknown entities or has an invalid value".to_string(),
                        )
                    })?;
                json!({ "message": message, "constraint": constraint })
            }
            Subject::None => json!({ "message": message }),
        };
        Ok(CommandOutcome {
            document,
            result,
            report,
        })
    }
}

enum Subject {
    Entity(Value),
    EntityId(String),
    Constraint(Value),
    None,
}

fn array_mut<'a>(root: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Vec<Value>, DocumentError> {
    root.entry(key)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| DocumentError::Validation(format!("invalid {key} array")))
}

fn push(root: &mut Map<String, Value>, key: &str, item: Value) -> Result<(), DocumentError> {
    array_mut(root, key)?.push(item);
    Ok(())
}

fn position(items: &[Value], id: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| item.get("id").and_then(Value::as_str) == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::default_entity_color;

    fn base() -> Document {
        let text = r##"{"entities": [
            {"id": "entity_1", "type": "line", "start": [0,0], "end": [2,2], "metadata": {"color": "#00ff88"}},
            {"id": "entity_2", "type": "circle", "center": [5,5], "radius": 1.5, "metadata": {"color": "#ff6b6b"}}
        ], "constraints": [
            {"id": "constraint_1", "type": "equal", "entities": ["entity_1", "entity_2"]}
        ]}"##;
        Document::parse(text, default_entity_color()).unwrap().0
    }

    fn run(command: Value) -> Result<CommandOutcome, DocumentError> {
        Command::from_value(command)?.apply(&base(), default_entity_color(), 1)
    }

    #[test]
    fn test_add_entity_assigns_id() {
        let outcome = run(json!({
            "action": "add_entity",
            "data": { "entity": { "type": "line", "start": [1, 1], "end": [3, 1] } }
        }))
        .unwrap();
        assert_eq!(outcome.document.entities.len(), 3);
        assert_eq!(outcome.document.entities[2].id, "entity_3");
        assert_eq!(outcome.document.entities[2].color(), Some("#00ff88"));
        assert_eq!(outcome.result["entity"]["id"], "entity_3");
    }

    #[test]
    fn test_add_entity_respects_id_counter() {
        let command = Command::from_value(json!({
            "action": "add_entity",
            "data": { "entity": { "type": "circle", "center": [0, 0], "radius": 2 } }
        }))
        .unwrap();
        // entity_3 and entity_4 existed once and were deleted.
        let outcome = command.apply(&base(), default_entity_color(), 5).unwrap();
        assert_eq!(outcome.document.entities[2].id, "entity_5");
    }

    #[test]
    fn test_add_invalid_entity_rejected() {
        let err = run(json!({
            "action": "add_entity",
            "data": { "entity": { "id": "entity_1", "type": "line", "start": [1, 1], "end": [3, 1] } }
        }))
        .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));
    }

    #[test]
    fn test_remove_entity_prunes_constraints() {
        let outcome = run(json!({ "action": "remove_entity", "data": { "entityId": "entity_2" } })).unwrap();
        assert_eq!(outcome.document.entities.len(), 1);
        assert!(outcome.document.constraints.is_empty());
        assert_eq!(outcome.report.constraints_pruned, 1);
        assert_eq!(outcome.result["entityId"], "entity_2");
    }

    #[test]
    fn test_remove_unknown_entity() {
        let err = run(json!({ "action": "remove_entity", "data": { "entityId": "entity_9" } })).unwrap_err();
        assert_eq!(err, DocumentError::EntityNotFound("entity_9".into()));
    }

    #[test]
    fn test_update_entity_shallow_merge() {
        let outcome = run(json!({
            "action": "update_entity",
            "data": { "entityId": "entity_2", "updates": { "radius": 4, "metadata": { "label": "hub" } } }
        }))
        .unwrap();
        let entity = &outcome.document.entities[1];
        assert_eq!(entity.metadata.get("label"), Some(&json!("hub")));
        // metadata was replaced wholesale, so the color is filled in again
        assert_eq!(entity.color(), Some("#00ff88"));
        assert_eq!(outcome.result["entity"]["radius"], json!(4));
    }

    #[test]
    fn test_update_cannot_break_geometry() {
        let err = run(json!({
            "action": "update_entity",
            "data": { "entityId": "entity_2", "updates": { "radius": -1 } }
        }))
        .unwrap_err();
        assert!(matches!(err, DocumentError::Validation(_)));
    }

    #[test]
    fn test_add_constraint() {
        let outcome = run(json!({
            "action": "add_constraint",
            "data": { "constraint": { "type": "distance", "entities": ["entity_1"], "value": 10 } }
        }))
        .unwrap();
        assert_eq!(outcome.document.constraints.len(), 2);
        assert!(outcome.document.constraints[1].id.starts_with("constraint_"));

        let dangling = run(json!({
            "action": "add_constraint",
            "data": { "constraint": { "type": "vertical", "entities": ["entity_7"] } }
        }));
        assert!(dangling.is_err());
    }

    #[test]
    fn test_clear_canvas() {
        let outcome = run(json!({ "action": "clear_canvas", "data": {} })).unwrap();
        assert!(outcome.document.entities.is_empty());
        assert!(outcome.document.constraints.is_empty());
        assert!(run(json!({ "action": "clear_canvas" })).is_ok());
    }

    #[test]
    fn test_unknown_or_missing_action() {
        assert_eq!(
            Command::from_value(json!({ "action": "explode" })).unwrap_err(),
            DocumentError::UnknownAction("explode".into())
        );
        assert!(matches!(
            Command::from_value(json!({ "data": {} })),
            Err(DocumentError::Validation(_))
        ));
    }
}
