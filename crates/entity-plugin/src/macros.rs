//! Convenience macros for plugin development.

/// Builds a `PluginDescriptor` from an identity, a `(major, minor, patch)`
/// version and the hooks it handles.
///
/// # Example
/// ```rust,ignore
/// let descriptor = descriptor!("memory", (1, 2, 0), [HookPoint::Think, HookPoint::Review]);
/// ```
#[macro_export]
macro_rules! descriptor {
    ($id:expr, ($major:expr, $minor:expr, $patch:expr)) => {
        $crate::prelude::PluginDescriptor::new(
            $id,
            $crate::prelude::Version::new($major, $minor, $patch),
        )
    };
    ($id:expr, ($major:expr, $minor:expr, $patch:expr), [$($hook:expr),* $(,)?]) => {
        $crate::descriptor!($id, ($major, $minor, $patch)).with_hooks([$($hook),*])
    };
}

/// Macro for quickly building a `HookPayload`.
///
/// # Example
/// ```rust,ignore
/// let payload = hook_payload!(HookPoint::Do, {
///     "tool_call" => json!({ "name": "echo", "args": {} }),
/// });
/// ```
#[macro_export]
macro_rules! hook_payload {
    ($hook:expr) => {
        $crate::prelude::HookPayload::new($hook)
    };
    ($hook:expr, { $($key:expr => $value:expr),* $(,)? }) => {{
        let mut payload = $crate::prelude::HookPayload::new($hook);
        $(
            payload.data.insert($key.to_string(), $value);
        )*
        payload
    }};
    ($hook:expr, message: $message:expr, { $($key:expr => $value:expr),* $(,)? }) => {{
        let mut payload = $crate::prelude::HookPayload::new($hook).with_message($message);
        $(
            payload.data.insert($key.to_string(), $value);
        )*
        payload
    }};
}
