//! .csproj package references.

use lazy_static::lazy_static;
use regex::Regex;

use super::DeclaredPackage;

lazy_static! {
    /// `<PackageReference Include="X" Version="1.0" />` or with a child
    /// `<Version>` element.
    static ref PACKAGE_REFERENCE: Regex = Regex::new(
        r"(?s)<PackageReference\b([^>]*?)(?:/>|>(.*?)</PackageReference>)"
    )
    .unwrap();
    static ref INCLUDE: Regex = Regex::new(r#"\bInclude\s*=\s*"([^"]+)""#).unwrap();
    static ref VERSION_ATTR: Regex = Regex::new(r#"\bVersion\s*=\s*"([^"]+)""#).unwrap();
    static ref VERSION_ELEMENT: Regex = Regex::new(r"<Version>\s*([^<]+?)\s*</Version>").unwrap();
}

pub fn parse_csproj(content: &str) -> Vec<DeclaredPackage> {
    PACKAGE_REFERENCE
        .captures_iter(content)
        .filter_map(|caps| {
            let attributes = caps.get(1)?.as_str();
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let name = INCLUDE.captures(attributes)?.get(1)?.as_str();
            let version = VERSION_ATTR
                .captures(attributes)
                .or_else(|| VERSION_ELEMENT.captures(body))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            // analyzers and build tooling are marked as private assets
            let scope = if attributes.contains("PrivateAssets") || body.contains("PrivateAssets") {
                "build"
            } else {
                "runtime"
            };
            Some(DeclaredPackage::new(name, version, scope))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csproj() {
        let content = r#"
<Project Sdk="Microsoft.NET.Sdk.Web">
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.3" />
    <PackageReference Include="Serilog">
      <Version>3.1.1</Version>
    </PackageReference>
    <PackageReference Include="StyleCop.Analyzers" Version="1.1.118" PrivateAssets="all" />
  </ItemGroup>
</Project>
"#;
        let packages = parse_csproj(content);
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].name, "Newtonsoft.Json");
        assert_eq!(packages[0].version.as_deref(), Some("13.0.3"));
        assert_eq!(packages[1].version.as_deref(), Some("3.1.1"));
        assert_eq!(packages[2].scope, "build");
    }
}
