use typed_builder::TypedBuilder;

/// What a virtual user does on every iteration of its loop.
///
/// The action is cloned into every user and must produce an
/// [`Outcome`](crate::metric::Outcome) without ever failing. Heavy objects such
/// as HTTP clients belong outside the closure and are cloned in cheaply.
///
/// ```
/// use shuttle_load::{metric::Outcome, Scenario};
///
/// let scenario = Scenario::builder()
///     .name("constant")
///     .action(|| async { Outcome::Success(1.0) })
///     .build();
/// assert_eq!(scenario.name, "constant");
/// ```
#[derive(Clone, TypedBuilder)]
pub struct Scenario<F> {
    #[builder(setter(into))]
    pub name: String,
    pub action: F,
}
