//! Prints every Strand CRD as a multi-document YAML stream.
//!
//! ```bash
//! cargo run -p crds --bin crdgen > config/crd/strand.yaml
//! ```

use crds::{
    StrandAuthConfig, StrandClient, StrandDataPlane, StrandInit, StrandStream, StrandTenant,
    StrandUser,
};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        StrandTenant::crd(),
        StrandStream::crd(),
        StrandClient::crd(),
        StrandUser::crd(),
        StrandDataPlane::crd(),
        StrandInit::crd(),
        StrandAuthConfig::crd(),
    ];

    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}
