//! Update extraction: given the objects a user-code call left
//! live in memory, compute the minimal ordered set of field updates plus
//! the set of objects whose histories must be extended.
//!
//! The sandbox/class-loader that deserializes objects and decides their
//! concrete field values is an external collaborator (explicit
//! non-goal); this crate consumes its output — already-typed
//! [`FieldValue`]s and a shadow old-value captured at load time — and only
//! computes the graph traversal, the diff, and the total order.

use std::collections::{HashMap, HashSet, VecDeque};

use tessera_types::{FieldSignature, FieldValue, StorageReference, TransactionReference, Update};

/// One instance, non-transient field slot on a live object, with the
/// shadow old-value captured when the object was loaded ("for
/// each instance, non-transient field, compare the current value to a
/// shadow *old-value* captured at load time").
#[derive(Clone, Debug)]
pub struct FieldSlot {
    pub signature: FieldSignature,
    /// `None` for a field that has no prior recorded value — always true
    /// for a newly-created object, since it has no "old" state to diff
    /// against.
    pub old_value: Option<FieldValue>,
    pub current_value: FieldValue,
    pub transient: bool,
}

/// One object handed back to the extractor after a user-code call.
#[derive(Clone, Debug)]
pub struct LiveObject {
    pub reference: StorageReference,
    /// `true` iff this object did not previously exist in the store (in
    /// that case a class-tag update is also emitted for it).
    pub is_new: bool,
    pub class_name: String,
    /// The TR of the jar defining this object's class — only meaningful
    /// (and only read) when `is_new`.
    pub jar: TransactionReference,
    pub fields: Vec<FieldSlot>,
}

/// Queried once per enum-typed field value to enforce /// invariant: "Enum-typed fields are forbidden from having instance
/// non-transient fields on their enum class." Implemented by the sandbox's
/// class model; this crate has no class metadata of its own.
pub trait EnumClassModel {
    fn enum_class_has_instance_fields(&self, class_name: &str) -> bool;
}

/// An `EnumClassModel` that reports no enum class ever declares instance
/// fields — useful for callers (and tests) with no sandbox wired in yet.
pub struct NoInstanceFieldEnums;

impl EnumClassModel for NoInstanceFieldEnums {
    fn enum_class_has_instance_fields(&self, _class_name: &str) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("enum class {0} illegally declares instance non-transient fields")]
    EnumClassHasInstanceFields(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionResult {
    /// The transaction's emitted update set, totally ordered 
    pub updates: Vec<Update>,
    /// Every object visited, in BFS order — the set to write or extend
    /// histories for.
    pub reachable: Vec<StorageReference>,
}

/// Computes the update set and reachable-object set for one transaction
///.
///
/// `seeds` are the objects directly returned/exposed by the call (e.g. the
/// receiver, a newly-constructed object, event objects); `objects` is the
/// full map of every live object the sandbox handed back, keyed by its
/// storage reference — the traversal only descends into objects present in
/// this map, so references to untouched store objects are left alone
/// ("a visited set keyed by SR ... avoiding pointer-graph aliasing
/// issues").
pub fn extract_updates(
    seeds: impl IntoIterator<Item = StorageReference>,
    objects: &HashMap<StorageReference, LiveObject>,
    enum_classes: &dyn EnumClassModel,
) -> Result<ExtractionResult, UpdateError> {
    let mut visited = HashSet::new();
    let mut queue: VecDeque<StorageReference> = seeds.into_iter().collect();
    let mut updates = Vec::new();
    let mut reachable = Vec::new();

    while let Some(sr) = queue.pop_front() {
        if !visited.insert(sr) {
            continue;
        }
        let object = match objects.get(&sr) {
            Some(object) => object,
            None => continue,
        };
        reachable.push(sr);

        if object.is_new {
            updates.push(Update::class_tag(sr, object.class_name.clone(), object.jar));
        }

        for field in &object.fields {
            if field.transient {
                continue;
            }
            if let FieldValue::Enum { class_name, .. } = &field.current_value {
                if enum_classes.enum_class_has_instance_fields(class_name) {
                    return Err(UpdateError::EnumClassHasInstanceFields(class_name.clone()));
                }
            }

            let changed = object.is_new || field.old_value.as_ref() != Some(&field.current_value);
            if changed {
                updates.push(Update::field(sr, field.signature.clone(), field.current_value.clone()));
            }

            if let FieldValue::Storage(child) = &field.current_value {
                if !visited.contains(child) {
                    queue.push_back(*child);
                }
            }
        }
    }

    updates.sort();
    Ok(ExtractionResult { updates, reachable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_crypto::Hash;
    use tessera_types::StorageType;

    fn tr(byte: u8) -> TransactionReference {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        TransactionReference::new(Hash::new(bytes))
    }

    fn sr(byte: u8, progressive: u64) -> StorageReference {
        StorageReference::new(tr(byte), progressive)
    }

    fn balance_field() -> FieldSignature {
        FieldSignature::new(StorageType::class("io.tessera.Account"), "balance", StorageType::Long)
    }

    #[test]
    fn new_object_emits_class_tag_and_all_field_updates() {
        let object_ref = sr(1, 0);
        let mut objects = HashMap::new();
        objects.insert(
            object_ref,
            LiveObject {
                reference: object_ref,
                is_new: true,
                class_name: "io.tessera.Account".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: balance_field(),
                    old_value: None,
                    current_value: FieldValue::Long(100),
                    transient: false,
                }],
            },
        );

        let result = extract_updates([object_ref], &objects, &NoInstanceFieldEnums).unwrap();
        assert_eq!(result.reachable, vec![object_ref]);
        assert_eq!(result.updates.len(), 2);
        assert_eq!(result.updates[0], Update::class_tag(object_ref, "io.tessera.Account", tr(9)));
    }

    #[test]
    fn unchanged_field_on_an_existing_object_emits_no_update() {
        let object_ref = sr(2, 0);
        let mut objects = HashMap::new();
        objects.insert(
            object_ref,
            LiveObject {
                reference: object_ref,
                is_new: false,
                class_name: "io.tessera.Account".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: balance_field(),
                    old_value: Some(FieldValue::Long(100)),
                    current_value: FieldValue::Long(100),
                    transient: false,
                }],
            },
        );

        let result = extract_updates([object_ref], &objects, &NoInstanceFieldEnums).unwrap();
        assert!(result.updates.is_empty());
        assert_eq!(result.reachable, vec![object_ref]);
    }

    #[test]
    fn changed_field_on_an_existing_object_emits_one_update() {
        let object_ref = sr(3, 0);
        let mut objects = HashMap::new();
        objects.insert(
            object_ref,
            LiveObject {
                reference: object_ref,
                is_new: false,
                class_name: "io.tessera.Account".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: balance_field(),
                    old_value: Some(FieldValue::Long(100)),
                    current_value: FieldValue::Long(50),
                    transient: false,
                }],
            },
        );

        let result = extract_updates([object_ref], &objects, &NoInstanceFieldEnums).unwrap();
        assert_eq!(result.updates, vec![Update::field(object_ref, balance_field(), FieldValue::Long(50))]);
    }

    #[test]
    fn transient_fields_are_never_emitted() {
        let object_ref = sr(4, 0);
        let mut objects = HashMap::new();
        objects.insert(
            object_ref,
            LiveObject {
                reference: object_ref,
                is_new: true,
                class_name: "io.tessera.Cache".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: balance_field(),
                    old_value: None,
                    current_value: FieldValue::Long(0),
                    transient: true,
                }],
            },
        );

        let result = extract_updates([object_ref], &objects, &NoInstanceFieldEnums).unwrap();
        assert_eq!(result.updates.len(), 1); // only the class-tag
    }

    #[test]
    fn bfs_traverses_object_graph_through_storage_fields_and_handles_cycles() {
        let a_ref = sr(5, 0);
        let b_ref = sr(5, 1);
        let owner_field = FieldSignature::new(StorageType::class("io.tessera.Node"), "next", StorageType::class("io.tessera.Node"));

        let mut objects = HashMap::new();
        objects.insert(
            a_ref,
            LiveObject {
                reference: a_ref,
                is_new: true,
                class_name: "io.tessera.Node".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: owner_field.clone(),
                    old_value: None,
                    current_value: FieldValue::Storage(b_ref),
                    transient: false,
                }],
            },
        );
        objects.insert(
            b_ref,
            LiveObject {
                reference: b_ref,
                is_new: true,
                class_name: "io.tessera.Node".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: owner_field,
                    old_value: None,
                    current_value: FieldValue::Storage(a_ref), // cycle back to a
                    transient: false,
                }],
            },
        );

        let result = extract_updates([a_ref], &objects, &NoInstanceFieldEnums).unwrap();
        assert_eq!(result.reachable.len(), 2);
        assert!(result.reachable.contains(&a_ref));
        assert!(result.reachable.contains(&b_ref));
        // 2 class-tags + 2 field updates, no infinite loop from the cycle.
        assert_eq!(result.updates.len(), 4);
    }

    #[test]
    fn enum_field_on_a_class_with_instance_fields_is_rejected() {
        struct Offending;
        impl EnumClassModel for Offending {
            fn enum_class_has_instance_fields(&self, _class_name: &str) -> bool {
                true
            }
        }

        let object_ref = sr(6, 0);
        let mut objects = HashMap::new();
        objects.insert(
            object_ref,
            LiveObject {
                reference: object_ref,
                is_new: true,
                class_name: "io.tessera.Account".into(),
                jar: tr(9),
                fields: vec![FieldSlot {
                    signature: FieldSignature::new(
                        StorageType::class("io.tessera.Account"),
                        "status",
                        StorageType::class("io.tessera.Status"),
                    ),
                    old_value: None,
                    current_value: FieldValue::Enum {
                        class_name: "io.tessera.Status".into(),
                        literal_name: "ACTIVE".into(),
                    },
                    transient: false,
                }],
            },
        );

        let err = extract_updates([object_ref], &objects, &Offending).unwrap_err();
        assert_eq!(err, UpdateError::EnumClassHasInstanceFields("io.tessera.Status".into()));
    }

    #[test]
    fn updates_come_out_totally_ordered() {
        let object_ref = sr(7, 0);
        let field_a = FieldSignature::new(StorageType::class("A"), "a", StorageType::Int);
        let field_z = FieldSignature::new(StorageType::class("A"), "z", StorageType::Int);

        let mut objects = HashMap::new();
        objects.insert(
            object_ref,
            LiveObject {
                reference: object_ref,
                is_new: true,
                class_name: "A".into(),
                jar: tr(1),
                fields: vec![
                    FieldSlot {
                        signature: field_z,
                        old_value: None,
                        current_value: FieldValue::Int(1),
                        transient: false,
                    },
                    FieldSlot {
                        signature: field_a,
                        old_value: None,
                        current_value: FieldValue::Int(2),
                        transient: false,
                    },
                ],
            },
        );

        let result = extract_updates([object_ref], &objects, &NoInstanceFieldEnums).unwrap();
        let sorted = {
            let mut sorted = result.updates.clone();
            sorted.sort();
            sorted
        };
        assert_eq!(result.updates, sorted, "extractor must already emit a sorted stream");
    }
}
