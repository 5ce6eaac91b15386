/// Type-state markers for the builder pattern
///
/// These types are used to track which required fields have been set
/// in the builder at compile-time, preventing invalid configurations.

use std::marker::PhantomData;

/// Marker trait for endpoint state
pub trait EndpointState {}

/// Endpoint has not been set
pub struct NoEndpoint;
impl EndpointState for NoEndpoint {}

/// Endpoint has been set
pub struct HasEndpoint;
impl EndpointState for HasEndpoint {}

/// Marker trait for auth-mode state
pub trait AuthState {}

/// Auth mode has not been set
pub struct NoAuthMode;
impl AuthState for NoAuthMode {}

/// Auth mode has been set
pub struct HasAuthMode;
impl AuthState for HasAuthMode {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<E, A> {
    _endpoint: PhantomData<E>,
    _auth: PhantomData<A>,
}

impl<E, A> TypeState<E, A> {
    pub(crate) fn new() -> Self {
        Self {
            _endpoint: PhantomData,
            _auth: PhantomData,
        }
    }
}

impl<E, A> Default for TypeState<E, A> {
    fn default() -> Self {
        Self::new()
    }
}
