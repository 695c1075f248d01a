use crate::errors::DecodeError;

/// Bounds-checked cursor over an encoded buffer.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.data.len() - self.pos;
        if n > remaining {
            return Err(DecodeError::InvalidLength {
                expected: self.pos + n,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let expected = self.pos + N;
        self.read_bytes(N)?
            .try_into()
            .map_err(|_| DecodeError::InvalidLength {
                expected,
                actual: self.data.len(),
            })
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.data.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(self.read_bytes(1)?[0])
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.data.len() - self.pos {
            0 => Ok(()),
            extra => Err(DecodeError::TrailingBytes(extra)),
        }
    }
}
