/// Raw value of a boxed Int or Bool as seen by the compiler. Each backend
/// narrows it to its machine word when emitting.
pub type CoolInt = i64;

/// Raw value stored in a boxed Bool.
pub const TRUE_VALUE: CoolInt = 1;
pub const FALSE_VALUE: CoolInt = 0;
