// 🔑 Arena handles
//
// Generational keys: a handle to a destroyed entity resolves to None instead
// of dangling, so virtual cells can hold them across reloads.

use slotmap::new_key_type;

new_key_type! {
    pub struct AccountId;
    pub struct TransId;
    pub struct SplitId;
}
