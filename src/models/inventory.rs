use serde::Deserialize;

// `/collections/{collection}/nfts?withOwner=true`
#[derive(Debug, Clone, Deserialize)]
pub struct RawOwnedNft {
    pub identifier: String,
    pub owner: Option<String>,
}

// `/tokens/{token}/accounts` and `/collections/{collection}/accounts`
#[derive(Debug, Clone, Deserialize)]
pub struct RawAccountBalance {
    pub address: String,
    pub balance: String,
}

// `/accounts/{address}/nfts`
#[derive(Debug, Clone, Deserialize)]
pub struct RawInventoryNft {
    pub identifier: String,
    pub balance: Option<String>,
}

// `/accounts/{address}/tokens/{token}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenBalance {
    pub balance: String,
}

// `/tokens/{token}`
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenMetadata {
    pub identifier: Option<String>,
    pub decimals: Option<u8>,
}
