//! Round trips through the XML and YAML surfaces.

use std::io::Write;

use bpmn_model::{Bpmn, BpmnAspect, FlowElement};

const ORDER_PROCESS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:zeebe="http://camunda.org/schema/zeebe/1.0">
  <bpmn:process id="order" isExecutable="true">
    <bpmn:startEvent id="start"/>
    <bpmn:serviceTask id="collect-money" name="Collect Money">
      <bpmn:extensionElements>
        <zeebe:taskDefinition type="payment-service" retries="5"/>
        <zeebe:taskHeaders>
          <zeebe:header key="method" value="VISA"/>
          <zeebe:header key="region" value="eu"/>
        </zeebe:taskHeaders>
        <zeebe:ioMapping>
          <zeebe:input source="$.totalPrice" target="$.price"/>
          <zeebe:output source="$.success" target="$.paid"/>
        </zeebe:ioMapping>
      </bpmn:extensionElements>
    </bpmn:serviceTask>
    <bpmn:endEvent id="end"/>
    <bpmn:sequenceFlow id="s1" sourceRef="start" targetRef="collect-money"/>
    <bpmn:sequenceFlow id="s2" sourceRef="collect-money" targetRef="end"/>
  </bpmn:process>
</bpmn:definitions>
"#;

#[test]
fn read_transform_validate_minimal_process() {
    let definition = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("valid model");
    let workflow = definition.workflow_by_id("order").expect("workflow");

    let aspect_of = |id: &str| workflow.element_by_id(id).unwrap().aspect();
    assert_eq!(aspect_of("start"), BpmnAspect::TakeSequenceFlow);
    assert_eq!(aspect_of("collect-money"), BpmnAspect::TakeSequenceFlow);
    assert_eq!(aspect_of("end"), BpmnAspect::ConsumeToken);
}

#[test]
fn sequence_flows_and_nodes_agree() {
    let definition = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("valid model");
    let workflow = definition.workflow_by_id("order").unwrap();

    for index in workflow.sequence_flow_indices() {
        let flow = workflow.sequence_flow(index).unwrap();
        let source = flow.source_node.expect("source resolved");
        let target = flow.target_node.expect("target resolved");
        assert!(workflow.elements[source].node().unwrap().outgoing.contains(&index));
        assert!(workflow.elements[target].node().unwrap().incoming.contains(&index));
    }
}

#[test]
fn encoded_headers_decode_in_declaration_order() {
    let definition = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("valid model");
    let workflow = definition.workflow_by_id("order").unwrap();
    let task = workflow
        .element_by_id("collect-money")
        .unwrap()
        .as_service_task()
        .unwrap();

    let encoded = &task.task_headers().unwrap().encoded_msgpack;
    let mut cursor = &encoded[..];
    let entries = rmp::decode::read_map_len(&mut cursor).expect("map header");
    assert_eq!(entries, 2);

    let mut pairs = Vec::new();
    let mut rest = cursor;
    for _ in 0..entries {
        let (key, tail) = rmp::decode::read_str_from_slice(rest).expect("key");
        let (value, tail) = rmp::decode::read_str_from_slice(tail).expect("value");
        pairs.push((key.to_string(), value.to_string()));
        rest = tail;
    }

    assert_eq!(
        pairs,
        [
            ("method".to_string(), "VISA".to_string()),
            ("region".to_string(), "eu".to_string()),
        ]
    );
    assert!(rest.is_empty());
}

#[test]
fn write_and_reread_preserves_the_model() {
    let definition = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("valid model");
    let xml = Bpmn::convert_to_string(&definition).expect("serialize");
    let reread = Bpmn::read_from_xml_str(&xml).expect("reread");

    let workflow = reread.workflow_by_id("order").expect("workflow");
    assert_eq!(workflow.elements.len(), 5);

    let task = workflow
        .element_by_id("collect-money")
        .unwrap()
        .as_service_task()
        .unwrap();
    assert_eq!(task.task_definition().unwrap().task_type, "payment-service");
    assert_eq!(task.task_definition().unwrap().retries, 5);
    assert_eq!(task.task_headers().unwrap().headers.len(), 2);

    let mapping = task.input_output_mapping().unwrap();
    assert_eq!(mapping.inputs.len(), 1);
    assert_eq!(mapping.outputs.len(), 1);
    assert_eq!(mapping.compiled_inputs.len(), 1);
}

#[test]
fn validate_is_stable_across_calls() {
    let definition = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("valid model");
    assert_eq!(Bpmn::validate(&definition), Bpmn::validate(&definition));
}

#[test]
fn builder_and_xml_models_validate_alike() {
    let built = Bpmn::create_executable_workflow("order")
        .start_event_with_id("start")
        .sequence_flow("s1")
        .service_task_with_id("collect-money")
        .task_type("payment-service")
        .task_retries(5)
        .done()
        .sequence_flow("s2")
        .end_event_with_id("end")
        .done()
        .expect("builder model");

    let workflow = built.workflow_by_id("order").unwrap();
    assert_eq!(
        workflow.element_by_id("start").unwrap().aspect(),
        BpmnAspect::TakeSequenceFlow
    );
    assert_eq!(
        workflow.element_by_id("end").unwrap().aspect(),
        BpmnAspect::ConsumeToken
    );
    assert!(!Bpmn::validate(&built).has_errors());
}

#[test]
fn read_from_xml_file_and_yaml_file() {
    let dir = tempfile::tempdir().expect("tempdir");

    let xml_path = dir.path().join("order.bpmn");
    let mut xml_file = std::fs::File::create(&xml_path).expect("create");
    xml_file.write_all(ORDER_PROCESS.as_bytes()).expect("write");

    let definition = Bpmn::read_from_xml_file(&xml_path).expect("read xml file");
    assert!(definition.workflow_by_id("order").is_some());

    let yaml_path = dir.path().join("order.yaml");
    std::fs::write(
        &yaml_path,
        "name: order\ntasks:\n  - id: ship\n    type: shipment-service\n",
    )
    .expect("write yaml");

    let definition = Bpmn::read_from_yaml_file(&yaml_path).expect("read yaml file");
    let workflow = definition.workflow_by_id("order").unwrap();
    assert!(workflow.element_by_id("ship").is_some());
}

#[test]
fn yaml_and_xml_agree_on_task_metadata() {
    let yaml = r#"
name: order
tasks:
  - id: collect-money
    type: payment-service
    retries: 5
    headers:
      method: VISA
      region: eu
    inputs:
      - source: $.totalPrice
        target: $.price
    outputs:
      - source: $.success
        target: $.paid
"#;
    let from_yaml = Bpmn::read_from_yaml_str(yaml).expect("yaml model");
    let from_xml = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("xml model");

    let task_of = |definition: &bpmn_model::WorkflowDefinition| {
        definition
            .workflow_by_id("order")
            .unwrap()
            .element_by_id("collect-money")
            .unwrap()
            .as_service_task()
            .cloned()
            .unwrap()
    };

    let yaml_task = task_of(&from_yaml);
    let xml_task = task_of(&from_xml);

    assert_eq!(
        yaml_task.task_definition().unwrap().task_type,
        xml_task.task_definition().unwrap().task_type
    );
    assert_eq!(
        yaml_task.task_headers().unwrap().encoded_msgpack,
        xml_task.task_headers().unwrap().encoded_msgpack
    );
    assert_eq!(
        yaml_task.input_output_mapping().unwrap().inputs,
        xml_task.input_output_mapping().unwrap().inputs
    );
}

#[test]
fn unknown_elements_do_not_break_the_executable_subset() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <bpmn:process id="order" isExecutable="true">
    <bpmn:startEvent id="start"/>
    <bpmn:userTask id="review"/>
    <bpmn:endEvent id="end"/>
    <bpmn:sequenceFlow id="s1" sourceRef="start" targetRef="end"/>
  </bpmn:process>
</bpmn:definitions>
"#;
    let definition = Bpmn::read_from_xml_str(xml).expect("valid model");
    let workflow = definition.workflow_by_id("order").unwrap();
    assert!(workflow.element_by_id("review").is_none());
    assert_eq!(workflow.elements.len(), 3);
}

#[test]
fn as_service_task_requires_the_variant() {
    let definition = Bpmn::read_from_xml_str(ORDER_PROCESS).expect("valid model");
    let workflow = definition.workflow_by_id("order").unwrap();
    let start = workflow.element_by_id("start").unwrap();
    assert!(start.as_service_task().is_none());
    assert!(matches!(start, FlowElement::StartEvent(_)));
}
