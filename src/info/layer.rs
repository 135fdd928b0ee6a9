//! Utilities for merging a base [`crate::info::Overridables`] with a
//! format-specific override layer, per spec §3's "Overrides" rules: an
//! overridden *value* replaces, and an overridden *list* replaces rather
//! than appends.

/// A type that can be produced by merging a more sparse "layer" over an
/// existing value.
pub trait ApplyLayer
where
    Self: Sized,
{
    /// The all-`Option` version of this type used for override documents.
    type Layer;

    /// Merge `layer` over `self`, preferring fields set in `layer`.
    fn apply_layer(&mut self, layer: Self::Layer);

    /// Merge an optional layer over `self`; a `None` layer is a no-op.
    fn apply_opt_layer(&mut self, layer: Option<Self::Layer>) {
        if let Some(layer) = layer {
            self.apply_layer(layer);
        }
    }
}

/// Extension trait providing `apply_val`: overwrite `self` with `layer` if
/// `layer` is `Some`.
pub trait ApplyValExt
where
    Self: Sized,
{
    /// Overwrite `self` with `layer` when `Some`.
    fn apply_val(&mut self, layer: Option<Self>);
}

impl<T> ApplyValExt for T {
    fn apply_val(&mut self, layer: Option<Self>) {
        if let Some(val) = layer {
            *self = val;
        }
    }
}

/// Extension trait providing `apply_opt`: overwrite an `Option<T>` with
/// another `Option<T>` if the latter is `Some`.
pub trait ApplyOptExt
where
    Self: Sized,
{
    /// Overwrite `self` with `layer` when `layer` is `Some`.
    fn apply_opt(&mut self, layer: Self);
}

impl<T> ApplyOptExt for Option<T> {
    fn apply_opt(&mut self, layer: Self) {
        if let Some(val) = layer {
            *self = Some(val);
        }
    }
}
