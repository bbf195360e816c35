use {
    crate::{
        provider::{AssetLoader, Payload, Provider},
        source::DataSource,
    },
    anyhow::{anyhow, Result},
    kestrel_core::{util, Error, Uri},
    std::sync::Arc,
};

/// Compiled shader binary: the SPIR-V word stream plus its content hash,
/// which feeds the pipeline cache's first-level key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpirvShader {
    pub words: Vec<u32>,
    pub hash: u64,
}

impl SpirvShader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 || bytes.len() < 20 {
            return Err(anyhow!(Error::CorruptAsset("SPIR-V size is not a word multiple".into())));
        }
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes(chunk.try_into().expect("4 bytes")))
            .collect();
        if words[0] != 0x0723_0203 {
            return Err(anyhow!(Error::CorruptAsset("bad SPIR-V magic".into())));
        }
        Ok(Self {
            hash: util::hash_bytes(bytes),
            words,
        })
    }
}

pub type ShaderProvider = Provider<ShaderLoader>;

const GLSL_EXTENSIONS: [&str; 3] = ["vert", "frag", "comp"];

pub struct ShaderLoader {
    source: Arc<dyn DataSource>,
    #[cfg(feature = "glsl-compile")]
    compiler: Option<shaderc::Compiler>,
}

impl ShaderLoader {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            #[cfg(feature = "glsl-compile")]
            compiler: shaderc::Compiler::new(),
        }
    }

    fn is_glsl(uri: &Uri) -> bool {
        uri.extension().is_some_and(|ext| GLSL_EXTENSIONS.contains(&ext))
    }

    /// Compiles `uri` to `<uri>.spv` under the mount point and returns the
    /// binary. A no-op unless built with the `glsl-compile` feature.
    #[cfg(feature = "glsl-compile")]
    fn compile(&mut self, uri: &Uri) -> Result<Option<Vec<u8>>> {
        let Some(compiler) = self.compiler.as_mut() else {
            return Ok(None);
        };
        let kind = match uri.extension() {
            Some("vert") => shaderc::ShaderKind::Vertex,
            Some("frag") => shaderc::ShaderKind::Fragment,
            Some("comp") => shaderc::ShaderKind::Compute,
            _ => return Ok(None),
        };
        let text = self.source.read_text(uri)?;
        let artifact = compiler
            .compile_into_spirv(&text, kind, uri.as_str(), "main", None)
            .map_err(|e| anyhow!(Error::CorruptAsset(format!("GLSL compile failed: {e}"))))?;
        let bytes = artifact.as_binary_u8().to_vec();

        let out = self.source.mount_point().join(uri.concat(".spv").as_str());
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::write(&out, &bytes)?;
        log::info!("Compiled {uri} -> {}", out.display());
        Ok(Some(bytes))
    }

    #[cfg(not(feature = "glsl-compile"))]
    fn compile(&mut self, _uri: &Uri) -> Result<Option<Vec<u8>>> { Ok(None) }
}

impl AssetLoader for ShaderLoader {
    type Asset = SpirvShader;

    fn load_payload(&mut self, uri: &Uri) -> Payload<SpirvShader> {
        let mut dependencies = vec![uri.clone()];
        let bytes = if Self::is_glsl(uri) {
            let compiled_uri = uri.concat(".spv");
            dependencies.push(compiled_uri.clone());
            match self.compile(uri) {
                Ok(Some(bytes)) => Ok(bytes),
                // No compiler: fall back to a previously compiled binary.
                Ok(None) => self.source.read(&compiled_uri),
                Err(e) => Err(e),
            }
        } else {
            self.source.read(uri)
        };

        let shader = bytes.and_then(|bytes| SpirvShader::from_bytes(&bytes));
        match shader {
            Ok(shader) => {
                log::debug!("Loaded shader {uri} (hash {:#x})", shader.hash);
                Payload {
                    asset: Some(shader),
                    dependencies,
                }
            }
            Err(e) => {
                log::warn!("Failed to load shader {uri}: {e}");
                Payload {
                    asset: None,
                    dependencies,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal valid-looking SPIR-V header: magic, version, generator, bound,
    // schema. Enough for the word-stream parser (reflection would reject it).
    fn fake_spirv_bytes() -> Vec<u8> {
        let words: [u32; 5] = [0x0723_0203, 0x0001_0600, 0, 8, 0];
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    #[test]
    fn parses_word_stream_and_hash() {
        let bytes = fake_spirv_bytes();
        let shader = SpirvShader::from_bytes(&bytes).unwrap();
        assert_eq!(shader.words.len(), 5);
        assert_eq!(shader.hash, util::hash_bytes(&bytes));
    }

    #[test]
    fn rejects_bad_magic_and_odd_sizes() {
        let mut bytes = fake_spirv_bytes();
        bytes[0] = 0;
        assert!(SpirvShader::from_bytes(&bytes).is_err());
        assert!(SpirvShader::from_bytes(&fake_spirv_bytes()[..18]).is_err());
    }

    #[test]
    fn loads_precompiled_binary_for_glsl_uri() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shaders")).unwrap();
        std::fs::write(dir.path().join("shaders/lit.vert.spv"), fake_spirv_bytes()).unwrap();

        let source: Arc<dyn DataSource> = Arc::new(crate::source::FsDataSource::new(dir.path()));
        let mut loader = ShaderLoader::new(source);
        // Without a compiler in the loop the .spv next to the source is used.
        #[cfg(feature = "glsl-compile")]
        {
            loader.compiler = None;
        }
        let payload = loader.load_payload(&Uri::from("shaders/lit.vert"));
        assert!(payload.asset.is_some());
        assert!(payload.dependencies.contains(&Uri::from("shaders/lit.vert.spv")));
    }
}
