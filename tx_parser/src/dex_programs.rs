use std::collections::HashMap;

/// Well-known swap programs, name and program id
pub const KNOWN_DEX_PROGRAMS: &[(&str, &str)] = &[
    ("Orca Whirlpool", "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc"),
    ("Raydium AMM", "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8"),
    ("Jupiter v4", "JUP4Fb2cqiRUcaTHdrPC8h2gNsA2ETXiPDD33WcGuJB"),
];

/// Program ids whose presence in a transaction's account list marks it as a swap
#[derive(Debug, Clone)]
pub struct DexProgramSet {
    programs: HashMap<String, String>,
}

impl Default for DexProgramSet {
    fn default() -> Self {
        Self {
            programs: KNOWN_DEX_PROGRAMS
                .iter()
                .map(|(name, id)| (id.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl DexProgramSet {
    /// Build from configured ids; ids from the known table keep their display name
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let programs = ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref().trim().to_string();
                let name = KNOWN_DEX_PROGRAMS
                    .iter()
                    .find(|(_, known)| *known == id)
                    .map(|(name, _)| name.to_string())
                    .unwrap_or_else(|| id.clone());
                (id, name)
            })
            .filter(|(id, _)| !id.is_empty())
            .collect();

        Self { programs }
    }

    pub fn contains(&self, program_id: &str) -> bool {
        self.programs.contains_key(program_id)
    }

    /// Name of the first known program among `account_keys`
    pub fn find_in<'a>(&'a self, account_keys: &[String]) -> Option<&'a str> {
        account_keys
            .iter()
            .find_map(|key| self.programs.get(key).map(|name| name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
