//! Carregamento do tokenizador de subpalavras.
//!
//! A família do modelo é resolvida uma única vez a partir do nome do checkpoint;
//! uma família desconhecida aborta antes de qualquer documento ser lido.

use std::path::Path;
use std::sync::Arc;

use nerwin_core::{BpeLiteTokenizer, ModelFamily, SubwordTokenizer, TokenizerConfig};
use tracing::info;

/// Tokenizador compartilhável entre threads (rayon e handlers do axum).
pub type SharedTokenizer = Arc<dyn SubwordTokenizer + Send + Sync>;

pub struct LoadedTokenizer {
    pub tokenizer: SharedTokenizer,
    pub config: TokenizerConfig,
}

/// Resolve a família e carrega o tokenizador.
///
/// Sem `path`, usa o [`BpeLiteTokenizer`] embutido com os IDs especiais dele.
pub fn load(model_name: &str, path: Option<&Path>) -> anyhow::Result<LoadedTokenizer> {
    let family = ModelFamily::from_model_name(model_name)?;

    let loaded = match path {
        Some(path) => load_pretrained(family, path)?,
        None => LoadedTokenizer {
            tokenizer: Arc::new(BpeLiteTokenizer::new()),
            config: TokenizerConfig::new(family, BpeLiteTokenizer::boundary_tokens()),
        },
    };

    info!(
        model = model_name,
        family = ?loaded.config.family,
        add_prefix_space = loaded.config.add_prefix_space,
        start = loaded.config.boundary.start,
        end = loaded.config.boundary.end,
        "tokenizador pronto"
    );
    Ok(loaded)
}

#[cfg(feature = "hf")]
fn load_pretrained(family: ModelFamily, path: &Path) -> anyhow::Result<LoadedTokenizer> {
    let tokenizer = crate::hf::HfTokenizer::from_file(path)?;
    let boundary = tokenizer.boundary_tokens(family)?;
    Ok(LoadedTokenizer {
        tokenizer: Arc::new(tokenizer),
        config: TokenizerConfig::new(family, boundary),
    })
}

#[cfg(not(feature = "hf"))]
fn load_pretrained(_family: ModelFamily, path: &Path) -> anyhow::Result<LoadedTokenizer> {
    anyhow::bail!(
        "não é possível carregar {}: compile nerwin-web com `--features hf`",
        path.display()
    )
}
