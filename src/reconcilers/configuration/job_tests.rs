// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for executor Job assembly.

#[cfg(test)]
mod tests {
    use crate::reconcilers::configuration::job::*;
    use crate::reconcilers::configuration::types::{ExecutionType, RunContext};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

    fn base_meta() -> RunContext {
        RunContext {
            name: "poc".to_string(),
            namespace: "tenant-1".to_string(),
            controller_namespace: "tenant-1".to_string(),
            apply_job_name: "poc-apply".to_string(),
            destroy_job_name: "poc-destroy".to_string(),
            configuration_cm_name: "tf-poc".to_string(),
            variable_secret_name: "variable-poc".to_string(),
            terraform_image: "oamdev/docker-terraform:1.1.2".to_string(),
            busybox_image: "busybox:latest".to_string(),
            git_image: "alpine/git:latest".to_string(),
            remote_git_path: ".".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_job_identity() {
        let job = assemble_terraform_job(&base_meta(), ExecutionType::Apply);
        assert_eq!(job.metadata.name.as_deref(), Some("poc-apply"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("tenant-1"));
    }

    #[test]
    fn test_destroy_job_identity_and_command() {
        let job = assemble_terraform_job(&base_meta(), ExecutionType::Destroy);
        assert_eq!(job.metadata.name.as_deref(), Some("poc-destroy"));

        let pod = job.spec.unwrap().template.spec.unwrap();
        let command = pod.containers[0].command.clone().unwrap();
        assert_eq!(command[2], "terraform destroy -lock=false -auto-approve");
    }

    #[test]
    fn test_job_spec_delegates_retries_to_executor() {
        let job = assemble_terraform_job(&base_meta(), ExecutionType::Apply);
        let spec = job.spec.unwrap();
        assert_eq!(spec.parallelism, Some(1));
        assert_eq!(spec.completions, Some(1));
        assert_eq!(spec.backoff_limit, Some(i32::MAX));
    }

    #[test]
    fn test_pod_shape() {
        let job = assemble_terraform_job(&base_meta(), ExecutionType::Apply);
        let template = job.spec.unwrap().template;

        let annotations = template.metadata.unwrap().annotations.unwrap();
        assert_eq!(
            annotations.get("sidecar.istio.io/inject").map(String::as_str),
            Some("false")
        );

        let pod = template.spec.unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("OnFailure"));
        assert_eq!(
            pod.service_account_name.as_deref(),
            Some("tf-executor-service-account")
        );
        assert!(pod.node_selector.is_none());
    }

    #[test]
    fn test_inline_configuration_has_two_init_containers() {
        let job = assemble_terraform_job(&base_meta(), ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        let init_containers = pod.init_containers.unwrap();

        assert_eq!(init_containers.len(), 2);
        assert_eq!(
            init_containers[0].name,
            "prepare-input-terraform-configurations"
        );
        assert_eq!(init_containers[1].name, "terraform-init");
    }

    #[test]
    fn test_remote_configuration_adds_git_clone_step() {
        let mut meta = base_meta();
        meta.remote_git = "https://gitlab.com/example/modules.git".to_string();
        meta.remote_git_path = "stacks/network".to_string();

        let job = assemble_terraform_job(&meta, ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        let init_containers = pod.init_containers.unwrap();

        assert_eq!(init_containers.len(), 3);
        assert_eq!(init_containers[1].name, "git-configuration");
        let command = init_containers[1].command.clone().unwrap();
        assert!(command[2].contains("git clone https://gitlab.com/example/modules.git"));
        assert!(command[2].contains("/opt/tf-backend/stacks/network"));
    }

    #[test]
    fn test_executor_command_and_env() {
        let mut meta = base_meta();
        meta.envs = vec![k8s_openapi::api::core::v1::EnvVar {
            name: "TF_VAR_name".to_string(),
            ..Default::default()
        }];

        let job = assemble_terraform_job(&meta, ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        let executor = &pod.containers[0];

        assert_eq!(executor.name, "terraform-executor");
        let command = executor.command.clone().unwrap();
        assert_eq!(command[2], "terraform apply -lock=false -auto-approve");
        assert_eq!(executor.env.as_ref().unwrap()[0].name, "TF_VAR_name");

        // terraform-init shares the env so `terraform init` can reach
        // private module registries.
        let init_containers = pod.init_containers.unwrap();
        assert_eq!(
            init_containers.last().unwrap().env.as_ref().unwrap()[0].name,
            "TF_VAR_name"
        );
    }

    #[test]
    fn test_volumes_project_the_configuration() {
        let volumes = assemble_executor_volumes(&base_meta());
        assert_eq!(volumes.len(), 3);
        assert_eq!(volumes[0].name, "poc");
        assert!(volumes[0].empty_dir.is_some());
        assert_eq!(volumes[1].name, "tf-input-configuration");
        assert_eq!(
            volumes[1].config_map.as_ref().unwrap().name,
            "tf-poc"
        );
        assert_eq!(volumes[2].name, "tf-backend");
        assert!(volumes[2].empty_dir.is_some());
    }

    #[test]
    fn test_no_resources_configured_means_no_requirements() {
        let job = assemble_terraform_job(&base_meta(), ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        assert!(pod.containers[0].resources.is_none());
    }

    #[test]
    fn test_limits_applied_to_executor() {
        let mut meta = base_meta();
        meta.resources_limits_cpu = "500m".to_string();
        meta.resources_limits_cpu_quantity = Some(Quantity("500m".to_string()));
        meta.resources_limits_memory = "256Mi".to_string();
        meta.resources_limits_memory_quantity = Some(Quantity("256Mi".to_string()));

        let job = assemble_terraform_job(&meta, ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.clone().unwrap();
        let limits = resources.limits.unwrap();
        assert_eq!(limits["cpu"].0, "500m");
        assert_eq!(limits["memory"].0, "256Mi");
    }

    #[test]
    fn test_requests_branch_follows_limits_memory() {
        // Documents current behavior: setting only the memory limit also
        // opens the (empty) requests map, while a lone memory request does
        // not. See the TODO in executor_resource_requirements.
        let mut meta = base_meta();
        meta.resources_limits_memory = "256Mi".to_string();
        meta.resources_limits_memory_quantity = Some(Quantity("256Mi".to_string()));

        let job = assemble_terraform_job(&meta, ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.clone().unwrap();
        assert!(resources.requests.is_some());
        assert!(resources.requests.unwrap().is_empty());

        let mut meta = base_meta();
        meta.resources_requests_memory = "128Mi".to_string();
        meta.resources_requests_memory_quantity = Some(Quantity("128Mi".to_string()));

        let job = assemble_terraform_job(&meta, ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        let resources = pod.containers[0].resources.clone().unwrap();
        assert!(resources.requests.is_none());
    }

    #[test]
    fn test_node_selector_propagates() {
        let mut meta = base_meta();
        meta.job_node_selector = Some(
            [("disktype".to_string(), "ssd".to_string())]
                .into_iter()
                .collect(),
        );

        let job = assemble_terraform_job(&meta, ExecutionType::Apply);
        let pod = job.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod.node_selector.unwrap().get("disktype").map(String::as_str),
            Some("ssd")
        );
    }
}
