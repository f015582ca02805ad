//! Memória linear
//!
//! Uma região de bytes de tamanho fixo. A imagem do programa é copiada para
//! o endereço 0; o resto começa zerado (`halt`).

use crate::error::{LoadError, Violation};
use crate::image::ProgramImage;
use crate::operand::ByteReader;

/// Tamanho padrão da memória: 64 KiB
pub const MEMORY_SIZE: usize = 65536;

/// Memória da VM de tamanho fixo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearMemory {
    bytes: Vec<u8>,
}

impl LinearMemory {
    /// Memória zerada de `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Copia a imagem para o endereço 0
    pub fn load(&mut self, image: &ProgramImage) -> Result<(), LoadError> {
        let code = image.bytes();
        if code.len() > self.bytes.len() {
            return Err(LoadError::ImageTooLarge {
                size: code.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes[..code.len()].copy_from_slice(code);
        Ok(())
    }

    pub fn read(&self, addr: usize) -> Result<u8, Violation> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(Violation::MemoryOutOfBounds { addr })
    }

    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), Violation> {
        let slot = self
            .bytes
            .get_mut(addr)
            .ok_or(Violation::MemoryOutOfBounds { addr })?;
        *slot = value;
        Ok(())
    }

    /// Cursor posicionado em `addr` para decodificar instruções
    pub fn reader_at(&self, addr: usize) -> ByteReader<'_> {
        ByteReader::at(&self.bytes, addr)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}
