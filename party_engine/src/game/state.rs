//! The mutable game-state tree and dotted-path addressing.

use super::{config::GameConfig, errors::StateError};
use serde_json::{Map, Value};

const STATUS: &str = "status";
const PLAYER_ATTRIBUTES: &str = "playerAttributes";

/// Shared state of one game instance.
///
/// The root is always an object holding `status`, the seeded
/// `initialGameState` fields and `playerAttributes`.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    root: Value,
}

impl GameState {
    pub fn new(config: &GameConfig) -> Self {
        let mut root = config.initial_game_state.clone();
        root.insert(
            STATUS.to_string(),
            Value::String(config.initial_state.clone()),
        );
        if !matches!(root.get(PLAYER_ATTRIBUTES), Some(Value::Object(_))) {
            root.insert(PLAYER_ATTRIBUTES.to_string(), Value::Object(Map::new()));
        }
        Self {
            root: Value::Object(root),
        }
    }

    pub fn status(&self) -> &str {
        self.root
            .get(STATUS)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub(crate) fn set_status(&mut self, status: &str) {
        if let Value::Object(root) = &mut self.root {
            root.insert(STATUS.to_string(), Value::String(status.to_string()));
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn player_attributes(&self, player_id: &str) -> Option<&Value> {
        self.root.get(PLAYER_ATTRIBUTES)?.get(player_id)
    }

    /// Seeds `playerAttributes[player_id]` from the template unless present.
    pub fn seed_player(&mut self, player_id: &str, template: &Map<String, Value>) -> bool {
        let Value::Object(root) = &mut self.root else {
            return false;
        };
        let attributes = root
            .entry(PLAYER_ATTRIBUTES)
            .or_insert_with(|| Value::Object(Map::new()));
        if !attributes.is_object() {
            *attributes = Value::Object(Map::new());
        }
        match attributes {
            Value::Object(map) if !map.contains_key(player_id) => {
                map.insert(player_id.to_string(), Value::Object(template.clone()));
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.root, path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut cursor = &mut self.root;
        for segment in segments(path).ok()? {
            cursor = match cursor {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cursor)
    }

    /// Writes `value` at `path`, creating intermediate objects.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), StateError> {
        let segments = writable_segments(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(StateError::EmptyPath);
        };

        let mut cursor = &mut self.root;
        for segment in parents {
            cursor = child_mut(cursor, segment, path)?;
        }

        if cursor.is_null() {
            *cursor = Value::Object(Map::new());
        }
        match cursor {
            Value::Object(map) => {
                map.insert(last.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = parse_index(last, path)?;
                if index < items.len() {
                    items[index] = value;
                } else if index == items.len() {
                    items.push(value);
                } else {
                    return Err(StateError::IndexOutOfBounds {
                        path: path.to_string(),
                        segment: last.to_string(),
                    });
                }
                Ok(())
            }
            _ => Err(StateError::NotAContainer {
                path: path.to_string(),
                segment: last.to_string(),
            }),
        }
    }

    /// Removes the field at `path`, returning it if it existed.
    pub fn unset(&mut self, path: &str) -> Result<Option<Value>, StateError> {
        let segments = writable_segments(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Err(StateError::EmptyPath);
        };

        let parent = if parents.is_empty() {
            Some(&mut self.root)
        } else {
            self.get_mut(&parents.join("."))
        };
        Ok(match parent {
            Some(Value::Object(map)) => map.shift_remove(*last),
            Some(Value::Array(items)) => match last.parse::<usize>() {
                Ok(index) if index < items.len() => Some(items.remove(index)),
                _ => None,
            },
            _ => None,
        })
    }
}

/// Reads the value at a dotted path below `root`.
pub fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut cursor = root;
    for segment in segments(path).ok()? {
        cursor = match cursor {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

fn segments(path: &str) -> Result<Vec<&str>, StateError> {
    let segments: Vec<&str> = path
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(StateError::EmptyPath);
    }
    Ok(segments)
}

fn writable_segments(path: &str) -> Result<Vec<&str>, StateError> {
    let segments = segments(path)?;
    if segments[0] == STATUS {
        return Err(StateError::ProtectedPath(STATUS.to_string()));
    }
    Ok(segments)
}

fn parse_index(segment: &str, path: &str) -> Result<usize, StateError> {
    segment.parse().map_err(|_| StateError::NotAContainer {
        path: path.to_string(),
        segment: segment.to_string(),
    })
}

fn child_mut<'v>(value: &'v mut Value, segment: &str, path: &str) -> Result<&'v mut Value, StateError> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => Ok(map
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = parse_index(segment, path)?;
            items.get_mut(index).ok_or_else(|| StateError::IndexOutOfBounds {
                path: path.to_string(),
                segment: segment.to_string(),
            })
        }
        _ => Err(StateError::NotAContainer {
            path: path.to_string(),
            segment: segment.to_string(),
        }),
    }
}
