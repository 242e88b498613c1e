//! The host interface the renderer evaluates expressions through: a
//! `context`/`local`/`shared`-carrying evaluator, generalised into a Rust
//! trait so any host value model can plug in.

/// Capability queries and stringification accessors a [`Bridge::Value`]
/// must provide so the renderer can realise the stringification table
/// without ever matching on a concrete host type.
pub trait RenderValue: Clone {
    /// Whether this value should be appended as its UTF-8 bytes.
    fn is_string(&self) -> bool;
    /// Whether this value should be appended as raw bytes without a UTF-8
    /// round-trip (a host byte buffer).
    fn is_buffer(&self) -> bool;
    /// Whether this value is a plain object (appended as JSON).
    fn is_object(&self) -> bool;
    /// Whether this value is an array (appended as JSON).
    fn is_array(&self) -> bool;
    /// Whether this value is numeric (appended in canonical decimal).
    fn is_number(&self) -> bool;
    /// Whether this value is a boolean (appended as `true`/`false`).
    fn is_boolean(&self) -> bool;
    /// Whether this value is `undefined`/`null` (appended as nothing).
    fn is_nullish(&self) -> bool;

    /// Borrows the bytes backing a string or buffer value.
    ///
    /// Only called when [`Self::is_string`] or [`Self::is_buffer`] holds.
    fn as_bytes(&self) -> &[u8];
    /// Renders a numeric value in canonical decimal form.
    ///
    /// Only called when [`Self::is_number`] holds.
    fn as_number_string(&self) -> String;
    /// Unwraps a boolean value.
    ///
    /// Only called when [`Self::is_boolean`] holds.
    fn as_bool(&self) -> bool;
    /// Renders an object or array value as JSON bytes.
    ///
    /// Only called when [`Self::is_object`] or [`Self::is_array`] holds.
    fn to_json_bytes(&self) -> Vec<u8>;
}

/// The iterable a loop's right-hand side evaluates to, plus enough
/// bookkeeping for the renderer to drive forward/reverse iteration over
/// either an array or an object's own keys.
pub struct LoopIterable<V> {
    /// The evaluated iterable itself, passed back into the per-element
    /// assignment calls.
    pub iterable: V,
    /// For an object, the key at each index (`keys[i]` names the i-th
    /// property). Empty for arrays, whose keys are just `0..length`.
    pub keys: Vec<String>,
    /// `true` iff every key, in order, equals the string form of its index.
    pub is_array: bool,
    /// Number of elements to iterate (`keys.len()` for objects, the
    /// array's own length for arrays).
    pub length: usize,
}

/// The host-side evaluation surface the renderer drives. One call sequence
/// per `render`/`render_string` invocation; components re-enter `render`
/// recursively on the same `Bridge`, scoping `context`/`local` via the
/// backup/restore pair around each nested call.
pub trait Bridge {
    /// The dynamic value type this host embedding evaluates expressions to.
    type Value: RenderValue;
    /// An opaque backup handle for `context`/`local`, round-tripped through
    /// [`Bridge::restore_context`]/[`Bridge::restore_local`].
    type Backup;

    /// Evaluates a normal template's expression. `Ok(None)` models an
    /// `undefined`/`null` result, a no-op for the renderer.
    fn eval_template(&mut self, expr: &[u8]) -> Result<Option<Self::Value>, String>;
    /// Evaluates a void template's expression, discarding the result.
    fn eval_void_template(&mut self, expr: &[u8]) -> Result<(), String>;
    /// Evaluates a conditional's expression to a boolean.
    fn eval_conditional_template(&mut self, expr: &[u8]) -> Result<bool, String>;
    /// Evaluates a loop's iterable expression into an iterable/keys pair.
    fn init_loop_iterable(&mut self, expr: &[u8]) -> Result<LoopIterable<Self::Value>, String>;
    /// Assigns `local[iterator] := iterable[index]` for an array iterable.
    fn eval_iterator_array_assignment(&mut self, clone: bool, iterator: &[u8], iterable: &Self::Value, index: usize);
    /// Assigns `local[iterator] := {key, value}` for an object iterable.
    fn eval_iterator_object_assignment(
        &mut self,
        clone: bool,
        iterator: &[u8],
        iterable: &Self::Value,
        keys: &[String],
        index: usize,
    );
    /// Clears `local[iterator]` once a loop is done with it.
    fn unassign(&mut self, iterator: &[u8]);
    /// Deep- or shallow-copies a value, per `clone`.
    fn copy_value(&self, clone: bool, value: &Self::Value) -> Self::Value;
    /// Snapshots the current `context`, for restoration after a component
    /// invocation replaces it.
    fn backup_context(&mut self, clone: bool) -> Self::Backup;
    /// Snapshots the current `local`, for restoration after a component
    /// invocation (or loop iteration, under `clone_local_in_loops`)
    /// replaces it.
    fn backup_local(&mut self, clone: bool) -> Self::Backup;
    /// Replaces `context` with the result of evaluating `expr` (an empty
    /// expression initialises an empty object).
    fn init_context(&mut self, expr: &[u8]) -> Result<(), String>;
    /// Replaces `local` with a fresh empty object.
    fn init_local(&mut self);
    /// Restores a previously captured `context` backup.
    fn restore_context(&mut self, backup: Self::Backup);
    /// Restores a previously captured `local` backup.
    fn restore_local(&mut self, backup: Self::Backup);
}
