//! Hand rolled serialization plumbing for the packet codec. Kept separate
//! from serde (which is used for config and persistence) so the wire format
//! can enforce closed, fixed-order, discriminator-first encoding and reject
//! anything it doesn't recognise.

use std::io;
use std::net;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Debug, Eq, PartialEq)]
pub enum NetworkError {
    /// Not enough data is available yet; try again once more bytes arrive.
    Wait,
    Fatal(ErrorType),
}

#[derive(Debug, Eq, PartialEq)]
pub enum ErrorType {
    UnknownDiscriminator(u8),
    PayloadTooLarge,
    EmptyPayload,
    Crypto,
    Io(io::ErrorKind),
    AddrParse,
}

impl From<io::Error> for NetworkError {
    fn from(err: io::Error) -> Self {
        NetworkError::Fatal(ErrorType::Io(err.kind()))
    }
}

impl From<net::AddrParseError> for NetworkError {
    fn from(_: net::AddrParseError) -> Self {
        NetworkError::Fatal(ErrorType::AddrParse)
    }
}

pub trait ErrorUtils {
    fn has_failed(&self) -> bool;
}

impl<T> ErrorUtils for NetworkResult<T> {
    #[inline]
    fn has_failed(&self) -> bool {
        matches!(self, Err(NetworkError::Fatal(_)))
    }
}

/// A writer aware of how much space is left in the underlying buffer, so
/// `Serialize` impls can bail out with `NetworkError::Wait` instead of
/// panicking or silently truncating.
pub trait SizedWrite: io::Write {
    fn free_capacity(&self) -> usize;
}

/// A reader aware of how much unread data remains, mirroring `SizedWrite`.
pub trait SizedRead: io::Read {
    fn remaining_data(&self) -> usize;
}

impl<'a> SizedWrite for io::Cursor<&'a mut [u8]> {
    #[inline]
    fn free_capacity(&self) -> usize {
        self.get_ref().len() - self.position() as usize
    }
}

impl<'a> SizedRead for io::Cursor<&'a [u8]> {
    #[inline]
    fn remaining_data(&self) -> usize {
        self.get_ref().len() - self.position() as usize
    }
}

/// Writes `Self` onto the wire using the closed, ordered-slot encoding.
pub trait Serialize: Sized {
    fn serialize<W: SizedWrite>(&self, stream: &mut W) -> NetworkResult<()>;
}

/// Reads `Self` back off the wire. Implementations must reject any
/// discriminator outside the closed packet set with
/// `ErrorType::UnknownDiscriminator`.
pub trait Deserialize: Sized {
    fn deserialize<R: SizedRead>(stream: &mut R) -> NetworkResult<Self>;
}
