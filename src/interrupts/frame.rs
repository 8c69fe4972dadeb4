//! Register snapshot handed to the dispatcher by the interrupt trampolines.

/// Stack image built by the common trampoline, lowest address first.
///
/// The trampoline pushes the error code (or a zero placeholder) and the vector,
/// then `pushad`, then `ds`. `eip`, `cs` and `eflags` were pushed by the CPU.
/// Everything runs at ring 0, so no stack switch happens and there is no
/// saved `esp`/`ss` pair above `eflags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct InterruptFrame {
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// `esp` as `pushad` saw it; ignored by `popad`.
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

const _: () = assert!(core::mem::size_of::<InterruptFrame>() == 14 * 4);

impl InterruptFrame {
    /// A frame as a trampoline would deliver it for `vector`.
    pub fn for_vector(vector: u8) -> Self {
        Self {
            vector: u32::from(vector),
            ..Self::default()
        }
    }

    pub fn with_error_code(mut self, error_code: u32) -> Self {
        self.error_code = error_code;
        self
    }

    /// Vector number; trampolines only ever push values below 256.
    pub fn vector(&self) -> u8 {
        self.vector as u8
    }
}

/// Vectors for which the CPU pushes an error code itself.
pub fn pushes_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21 | 29 | 30)
}
