//! Merging one section tree into another.
//!
//! This is what `@include` and `@inherit` do with the root of the included
//! file. Keys missing from the destination are deep-copied together with their
//! attributes. Two sections under the same key are merged recursively, and any
//! other collision overwrites the destination value. Both of the latter require
//! the destination key to be unprotected.
//!
//! After a key is merged it carries the source's flags, and its history is the
//! destination's history followed by the source's.

use tracing::{debug, trace};

use crate::section::{Section, SectionError, Value};

impl Section {
    /// Merge every key of `src` into `self`, in `src` order.
    ///
    /// Stops at the first protected key; keys merged before it stay merged.
    pub fn merge(&mut self, src: &Section) -> Result<(), SectionError> {
        for (key, src_entry) in src.entries() {
            let Some(dst_entry) = self.entry_mut(key) else {
                trace!(key = %key, "merge: copy");
                self.insert_entry(key, src_entry.clone());
                continue;
            };

            match (&mut dst_entry.value, &src_entry.value) {
                (Value::Section(dst_sub), Value::Section(src_sub)) => {
                    if dst_entry.attrs.is_protected() {
                        return Err(SectionError::SectionNotWritable { key: key.clone() });
                    }
                    debug!(section = %key, "merge: descend");
                    dst_sub.merge(src_sub)?;
                }
                (dst_value, src_value) => {
                    if dst_entry.attrs.is_protected() {
                        return Err(SectionError::KeyNotWritable { key: key.clone() });
                    }
                    trace!(key = %key, "merge: overwrite");
                    *dst_value = src_value.clone();
                }
            }
            dst_entry.attrs.overlay(&src_entry.attrs);
        }
        Ok(())
    }
}
