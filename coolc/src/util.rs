pub enum ReturnCode {
    Ok = 0,

    OtherErrors = 1,

    /// The typed class hierarchy could not be read or decoded.
    InputError = 2,

    /// Target unavailable, artifact unwritable, or an external assembler/linker failed.
    ToolchainError = 3,

    /// The command was used incorrectly, e.g., with the wrong number of arguments, a bad flag, a bad syntax in a parameter, etc…
    ExUsage = 64,
}

pub fn exit(rc: ReturnCode) -> ! {
    std::process::exit(rc as i32);
}
