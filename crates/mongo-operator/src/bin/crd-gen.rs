//! Print the MongoCluster CustomResourceDefinition as YAML.

use kube::CustomResourceExt;

use mongo_operator::crds::MongoCluster;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&MongoCluster::crd())?);
    Ok(())
}
