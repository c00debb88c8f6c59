//! Compiled code artifacts linked into invalidation lists.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of one compiled artifact.  Two compilations of the same source
/// produce distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code#{}", self.0)
    }
}

/// Output of one successful compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    id: ArtifactId,
    function_name: String,
    code_hash: String,
}

impl CompiledArtifact {
    pub fn new(id: ArtifactId, function_name: impl Into<String>, code: &[u8]) -> Self {
        let digest = Sha256::digest(code);
        Self {
            id,
            function_name: function_name.into(),
            code_hash: format!("sha256:{}", hex::encode(digest)),
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// `sha256:<hex>` digest of the generated code bytes.
    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }
}
