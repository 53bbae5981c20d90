pub const BETA_ALL: &str = "all";
pub const BETA_WORKSPACES: &str = "workspaces";

pub fn can_use_all_betas(betas: &[String]) -> bool {
    betas.iter().any(|beta| beta == BETA_ALL)
}

pub fn can_use_workspaces(betas: &[String]) -> bool {
    can_use_all_betas(betas) || betas.iter().any(|beta| beta == BETA_WORKSPACES)
}
