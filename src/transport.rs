//! The register access we need from whatever is connected to the board

/// Name of the ADC16 controller device in the FPGA design.
/// Word 0 carries the 3-wire lines, word 1 the control bits and the snapshot buffers follow
/// at a stride of 1024 words per chip.
pub const CONTROLLER: &str = "adc16_controller";

/// A connected board exposing named, word-addressed registers
///
/// Offsets and indices are in 32-bit words. Implementations must complete each request before
/// returning, the 3-wire protocol depends on every write landing in program order.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the word at `index` of register `name`
    async fn read(&mut self, name: &str, index: u32) -> Result<u32, Self::Error>;

    /// Write `word` to `index` of register `name`
    async fn write(&mut self, name: &str, index: u32, word: u32) -> Result<(), Self::Error>;

    /// Read `len` consecutive words of register `name` starting at `offset`
    async fn read_block(
        &mut self,
        name: &str,
        offset: u32,
        len: u32,
    ) -> Result<Vec<u32>, Self::Error>;
}
