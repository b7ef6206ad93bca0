/// Authorization seam. Every roster mutation asks this before touching state.
pub trait Authorizer {
    fn is_caller_admin(&self) -> bool;
}

/// Fixed answer, for callers that resolved the role up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAuthorizer {
    admin: bool,
}

impl StaticAuthorizer {
    pub const ADMIN: StaticAuthorizer = StaticAuthorizer { admin: true };
    pub const VIEWER: StaticAuthorizer = StaticAuthorizer { admin: false };

    pub fn new(admin: bool) -> Self {
        Self { admin }
    }
}

impl Authorizer for StaticAuthorizer {
    fn is_caller_admin(&self) -> bool {
        self.admin
    }
}

impl Authorizer for bool {
    fn is_caller_admin(&self) -> bool {
        *self
    }
}
