//! Variables: the smallest values exposed over the protocol.

use crate::error::CoreError;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Protocol id of a variable.
pub type VarId = u8;

/// Smallest allowed variable size in bytes.
pub const VARIABLE_MIN_SIZE: usize = 1;

/// Largest allowed variable size in bytes.
pub const VARIABLE_MAX_SIZE: usize = 127;

/// Opaque application data attached to a variable or curve.
pub type UserTag = Arc<dyn Any + Send + Sync>;

/// Byte buffer shared between a variable and the application that owns it.
///
/// The engine reads and writes through it in place; the application keeps a
/// clone to observe writes and publish new values.
#[derive(Clone)]
pub struct VarData(Arc<RwLock<Box<[u8]>>>);

impl VarData {
    pub fn new(initial: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(RwLock::new(initial.into().into_boxed_slice())))
    }

    /// Creates a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.0.read(), |buf| &**buf)
    }

    /// Locks the bytes for writing. The length is fixed at creation.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.0.write(), |buf| &mut **buf)
    }

    /// Returns a copy of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.read().to_vec()
    }

    /// Overwrites the contents. `src` must be exactly as long as the buffer.
    pub fn set(&self, src: &[u8]) {
        self.0.write().copy_from_slice(src);
    }
}

impl fmt::Debug for VarData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VarData").field(&&**self.0.read()).finish()
    }
}

/// Description of a variable to register.
#[derive(Default)]
pub struct VariableDef {
    /// Whether clients may write the variable.
    pub writable: bool,
    /// Size in bytes, `1..=127`.
    pub size: usize,
    /// Backing buffer, exactly `size` bytes long.
    pub data: Option<VarData>,
    /// Untouched by the engine.
    pub user: Option<UserTag>,
}

impl VariableDef {
    /// Describes a read-only variable sized after its buffer.
    pub fn read_only(data: VarData) -> Self {
        Self {
            writable: false,
            size: data.len(),
            data: Some(data),
            user: None,
        }
    }

    /// Describes a writable variable sized after its buffer.
    pub fn writable(data: VarData) -> Self {
        Self {
            writable: true,
            ..Self::read_only(data)
        }
    }

    pub fn with_user(mut self, user: impl Any + Send + Sync) -> Self {
        self.user = Some(Arc::new(user));
        self
    }
}

/// A registered variable.
pub struct Variable {
    id: VarId,
    writable: bool,
    size: u8,
    data: VarData,
    user: Option<UserTag>,
}

impl Variable {
    /// Validates a definition and assigns it `id`.
    pub(crate) fn from_def(id: VarId, def: VariableDef) -> Result<Self, CoreError> {
        if !(VARIABLE_MIN_SIZE..=VARIABLE_MAX_SIZE).contains(&def.size) {
            return Err(CoreError::OutOfRange {
                field: "variable size",
                value: def.size,
                min: VARIABLE_MIN_SIZE,
                max: VARIABLE_MAX_SIZE,
            });
        }

        let data = def
            .data
            .ok_or_else(|| CoreError::invalid("variable has no data buffer"))?;
        if data.len() != def.size {
            return Err(CoreError::invalid(format!(
                "data buffer holds {} bytes, variable size is {}",
                data.len(),
                def.size
            )));
        }

        Ok(Self {
            id,
            writable: def.writable,
            size: def.size as u8,
            data,
            user: def.user,
        })
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size as usize
    }

    pub fn data(&self) -> &VarData {
        &self.data
    }

    /// Returns the user tag if it is a `T`.
    pub fn user<T: Any>(&self) -> Option<&T> {
        self.user.as_deref()?.downcast_ref()
    }

    /// Appends the current value to `out`.
    pub fn read_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data.read());
    }

    /// Stores a new value. `src` must be exactly [`Variable::size`] bytes.
    pub fn store(&self, src: &[u8]) {
        self.data.set(src);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id)
            .field("writable", &self.writable)
            .field("size", &self.size)
            .field("data", &self.data)
            .field("has_user", &self.user.is_some())
            .finish()
    }
}
