use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// A value that can absorb a sparse update.
///
/// `merge` is one level deep: every field present in the patch replaces the
/// corresponding field wholesale, absent fields keep their current value,
/// and nested records are never merged recursively.
///
/// Structs get an implementation from [`patchable!`](crate::patchable).
pub trait Patchable: Clone {
    /// Sparse description of which fields change.
    ///
    /// Patches travel into the store's write queue, so they must be `Send`.
    type Patch: Send;

    /// Build the value that results from applying `patch` over `self`.
    fn merge(&self, patch: Self::Patch) -> Self;
}

/// Update accepted by stores built without a reducer.
#[derive(Clone, Debug, PartialEq)]
pub enum Update<T: Patchable> {
    /// Replace the whole value.
    Replace(T),
    /// Shallow-merge the given fields over the current value.
    Patch(T::Patch),
}

impl<T: Patchable> Update<T> {
    /// Compute the value this update produces from `current`.
    pub fn apply(self, current: &T) -> T {
        match self {
            Update::Replace(value) => value,
            Update::Patch(patch) => current.merge(patch),
        }
    }
}

impl<K: Ord + Clone + Send, V: Clone + Send> Patchable for BTreeMap<K, V> {
    type Patch = BTreeMap<K, V>;

    fn merge(&self, patch: Self::Patch) -> Self {
        let mut merged = self.clone();
        merged.extend(patch);
        merged
    }
}

impl<K, V, S> Patchable for HashMap<K, V, S>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
    S: BuildHasher + Clone + Send,
{
    type Patch = HashMap<K, V, S>;

    fn merge(&self, patch: Self::Patch) -> Self {
        let mut merged = self.clone();
        merged.extend(patch);
        merged
    }
}

impl Patchable for serde_json::Map<String, serde_json::Value> {
    type Patch = serde_json::Map<String, serde_json::Value>;

    fn merge(&self, patch: Self::Patch) -> Self {
        let mut merged = self.clone();
        merged.extend(patch);
        merged
    }
}

/// Objects merge key by key; any other combination replaces the value.
impl Patchable for serde_json::Value {
    type Patch = serde_json::Value;

    fn merge(&self, patch: Self::Patch) -> Self {
        match (self, patch) {
            (serde_json::Value::Object(current), serde_json::Value::Object(patch)) => {
                serde_json::Value::Object(current.merge(patch))
            }
            (_, patch) => patch,
        }
    }
}

/// Declare a struct together with its sparse `<Name>Patch` companion.
///
/// The patch struct has one `Option` field per field of the original, a
/// `Default` impl where every field is `None`, and a chainable setter per
/// field. Field types must implement `Clone`, `Debug` and `PartialEq`.
///
/// ```
/// use partyline::{patchable, Store};
///
/// patchable! {
///     #[derive(Clone, Debug, PartialEq)]
///     pub struct Profile {
///         pub name: String,
///         pub age: u32,
///     }
/// }
///
/// let store = Store::new(Profile { name: "Ada".into(), age: 36 });
/// store.patch(ProfilePatch::default().age(37u32));
/// assert_eq!(store.get(), Profile { name: "Ada".into(), age: 37 });
/// ```
#[macro_export]
macro_rules! patchable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        $crate::__private::paste! {
            #[doc = concat!("Sparse update for [`", stringify!($name), "`]; `None` fields keep their current value.")]
            #[derive(Clone, Debug, Default, PartialEq)]
            $vis struct [<$name Patch>] {
                $(
                    $field_vis $field: ::core::option::Option<$ty>,
                )*
            }

            #[allow(dead_code)]
            impl [<$name Patch>] {
                $(
                    #[doc = concat!("Set `", stringify!($field), "`.")]
                    pub fn $field(mut self, value: impl ::core::convert::Into<$ty>) -> Self {
                        self.$field = ::core::option::Option::Some(value.into());
                        self
                    }
                )*
            }

            impl $crate::Patchable for $name {
                type Patch = [<$name Patch>];

                fn merge(&self, patch: Self::Patch) -> Self {
                    Self {
                        $(
                            $field: match patch.$field {
                                ::core::option::Option::Some(value) => value,
                                ::core::option::Option::None => ::core::clone::Clone::clone(&self.$field),
                            },
                        )*
                    }
                }
            }
        }
    };
}
