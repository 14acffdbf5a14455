//! Macros for declaring states with no behaviour of their own.

/// Declare unit structs that implement [`State`](crate::core::State) with
/// every hook left as a no-op.
///
/// Handy for placeholder states and tests. Each type derives `Debug`,
/// `Default`, `Clone` and `Copy`, and reports its type name as its state name.
///
/// # Example
///
/// ```
/// use state_lifecycle::{unit_states, StateMachine};
///
/// unit_states! {
///     pub Idle,
///     pub Patrol,
/// }
///
/// let machine = StateMachine::new();
/// machine.add_state(Idle).unwrap();
/// machine.add_state(Patrol).unwrap();
/// assert_eq!(machine.states_named("Patrol").len(), 1);
/// ```
#[macro_export]
macro_rules! unit_states {
    (
        $(
            $(#[$meta:meta])*
            $vis:vis $name:ident
        ),* $(,)?
    ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Default, Clone, Copy)]
            $vis struct $name;

            impl $crate::core::State for $name {}
        )*
    };
}
