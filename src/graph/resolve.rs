//! Call-site resolution
//!
//! Lightweight receiver typing: the enclosing receiver, a struct literal, or
//! the latest local binding preceding the call. Nothing else is followed.

use crate::index::{DeclRef, SymbolIndex};
use crate::types::{CallReceiver, CallSite, LocalBinding, ReferenceType};

/// Outcome of resolving one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Target declared in the caller's file
    Local(DeclRef),
    /// Target declared in another analyzed file
    CrossFile(DeclRef),
    /// No indexed configuration function matched
    Unresolved,
}

impl Resolution {
    pub fn target(&self) -> Option<DeclRef> {
        match self {
            Resolution::Local(decl) | Resolution::CrossFile(decl) => Some(*decl),
            Resolution::Unresolved => None,
        }
    }

    pub fn reference_type(&self) -> ReferenceType {
        match self {
            Resolution::Local(_) => ReferenceType::LocalResolved,
            Resolution::CrossFile(_) => ReferenceType::CrossFileResolved,
            Resolution::Unresolved => ReferenceType::UnresolvedExternal,
        }
    }
}

/// Where a call site sits
#[derive(Debug, Clone, Copy)]
pub struct CallScope<'s> {
    pub file: usize,
    /// Receiver struct of the enclosing method, if any
    pub receiver_struct: Option<&'s str>,
    pub bindings: &'s [LocalBinding],
}

/// Struct the receiver of a call evaluates to
pub fn receiver_struct(site: &CallSite, scope: &CallScope<'_>) -> Option<String> {
    match site.kind {
        CallReceiver::SelfReceiver => scope.receiver_struct.map(String::from),
        CallReceiver::StructLiteral => site.literal_struct.clone(),
        CallReceiver::LocalVariable => scope
            .bindings
            .iter()
            .filter(|b| b.name == site.receiver && b.line <= site.line)
            .max_by_key(|b| b.line)
            .map(|b| b.struct_name.clone()),
        CallReceiver::External => None,
    }
}

/// Resolve a call site against the symbol index
pub fn resolve_call(index: &SymbolIndex<'_>, site: &CallSite, scope: &CallScope<'_>) -> Resolution {
    let Some(struct_name) = receiver_struct(site, scope) else {
        return Resolution::Unresolved;
    };

    match index.config(&struct_name, &site.method) {
        Some(decl) if decl.file == scope.file => Resolution::Local(decl),
        Some(decl) => Resolution::CrossFile(decl),
        None => Resolution::Unresolved,
    }
}
